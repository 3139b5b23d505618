//! Builders and fake clients for testing code that evaluates eviction limits.
//!
//! The builders mirror the shape of the objects the API server returns, filling in names,
//! namespaces and statuses so tests only spell out what they care about.

mod client;
mod objects;

pub use client::*;
pub use objects::*;
