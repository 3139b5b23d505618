use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentry error tracking configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SentryConfig {
    /// Sentry DSN (Data Source Name) for error reporting.
    pub dsn: String,
}

impl fmt::Debug for SentryConfig {
    /// The DSN embeds a key, so it is redacted in debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SentryConfig")
            .field("dsn", &"REDACTED")
            .finish()
    }
}
