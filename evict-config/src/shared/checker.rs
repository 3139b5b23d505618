use crate::Config;
use crate::shared::{RetryConfig, SentryConfig, ValidationError};
use serde::{Deserialize, Serialize};

/// Default pause between two evaluation rounds.
const DEFAULT_INTERVAL_MS: u64 = 30_000;

/// Complete configuration for the eviction checker service.
///
/// Names the nodes whose pods are evaluated against the cluster's
/// PodDisruptionBudgets and how often that happens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CheckerConfig {
    /// Names of the nodes to evaluate on every round.
    pub nodes: Vec<String>,
    /// Pause between evaluation rounds, in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Backoff used when listing pods or budgets fails.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Optional Sentry configuration for error tracking.
    ///
    /// If `None`, the checker runs without Sentry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentry: Option<SentryConfig>,
}

fn default_interval_ms() -> u64 {
    DEFAULT_INTERVAL_MS
}

impl Config for CheckerConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &["nodes"];
}

impl CheckerConfig {
    /// Validates the checker configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.nodes.is_empty() {
            return Err(ValidationError::NoNodes);
        }

        if self.nodes.iter().any(|node| node.trim().is_empty()) {
            return Err(ValidationError::EmptyNodeName);
        }

        if self.interval_ms == 0 {
            return Err(ValidationError::IntervalZero);
        }

        if self.retry.max_attempts == 0 {
            return Err(ValidationError::MaxAttemptsZero);
        }

        if self.retry.backoff_factor < 1.0 {
            return Err(ValidationError::BackoffFactorTooSmall(
                self.retry.backoff_factor,
            ));
        }

        Ok(())
    }
}
