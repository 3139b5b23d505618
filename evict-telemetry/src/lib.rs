//! Logging and metrics setup shared by the services in this workspace.

pub mod metrics;
pub mod tracing;
