mod base;
mod checker;
mod retry;
mod sentry;

pub use base::*;
pub use checker::*;
pub use retry::*;
pub use sentry::*;
