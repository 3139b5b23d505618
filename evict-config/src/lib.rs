//! Configuration management for the eviction checker workspace.
//!
//! Provides environment detection, layered configuration loading from YAML
//! files and environment variables, and the shared configuration types used by
//! the services in this workspace.

mod environment;
mod load;
pub mod shared;

pub use environment::*;
pub use load::*;
