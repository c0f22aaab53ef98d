//! Error types for the Daygate service.
//!
//! The quota check itself never fails; these cover the service around it.

use thiserror::Error;

/// Main error type for Daygate operations.
#[derive(Error, Debug)]
pub enum DaygateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors (config files, listener bind, serving)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<::config::ConfigError> for DaygateError {
    fn from(err: ::config::ConfigError) -> Self {
        DaygateError::Config(err.to_string())
    }
}

/// Result type alias for Daygate operations.
pub type Result<T> = std::result::Result<T, DaygateError>;
