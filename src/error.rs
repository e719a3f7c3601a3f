//! Error types for the Turnstile limiter.

use thiserror::Error;

/// Construction-time configuration errors.
///
/// Per-request outcomes (missing identifying property, limit exceeded) are
/// not errors; they surface as [`crate::limit::Decision`] values and are
/// converted to responses at the middleware boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The window duration must be a positive number of milliseconds.
    #[error("window duration must be a positive number of milliseconds, got {0}")]
    InvalidWindow(u64),

    /// The per-window maximum must be positive.
    #[error("maximum events per window must be positive, got {0}")]
    InvalidMax(u64),

    /// A configured identifying property path is empty.
    #[error("identifying property path at index {0} is empty")]
    EmptyProperty(usize),
}

/// Result type alias for Turnstile operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
