use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// No node was listed for evaluation.
    #[error("`nodes` must contain at least one node name")]
    NoNodes,
    /// A listed node name is empty or only whitespace.
    #[error("`nodes` contains an empty node name")]
    EmptyNodeName,
    /// The evaluation interval cannot be zero.
    #[error("`interval_ms` cannot be zero")]
    IntervalZero,
    /// Retrying needs at least one attempt.
    #[error("`retry.max_attempts` cannot be zero")]
    MaxAttemptsZero,
    /// The backoff multiplier must not shrink the delay.
    #[error("`retry.backoff_factor` must be at least 1.0, got {0}")]
    BackoffFactorTooSmall(f32),
}
