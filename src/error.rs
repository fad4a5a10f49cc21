//! Error types for logger configuration

use thiserror::Error;

/// Configuration rejected at the point it was supplied
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Severity name outside INFO, WARNING, ERROR, FATAL
    #[error("log: invalid severity name {0:?}")]
    InvalidSeverity(String),

    /// Rotation interval text that is not a single known token
    #[error("log: invalid rotation interval {0:?}, expected one of never, daily, weekly, monthly")]
    InvalidInterval(String),

    /// Module override pattern that cannot be compiled
    #[error("log: invalid module pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Trace location not of the form `file:line`
    #[error("log: invalid trace location {0:?}, expected file:line")]
    InvalidTraceLocation(String),

    /// Compiled matcher rejected by the regex engine
    #[error("log: pattern compilation failed: {0}")]
    Regex(#[from] regex::Error),
}

/// Result alias for configuration calls
pub type Result<T> = std::result::Result<T, ConfigError>;
