//! Application error types
//!
//! Process-level error union used at startup and the server boundary.
//! Per-request errors never reach this type; they are converted to reply
//! envelopes at the relay boundary.

use beacon_core::DomainError;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Redis / fan-out backbone errors
    #[error("Cache error: {0}")]
    Cache(String),

    // Transport / listener errors
    #[error("Transport error: {0}")]
    Transport(String),

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Internal errors
    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

impl From<crate::config::ConfigError> for AppError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type alias using `AppError`
pub type AppResult<T> = Result<T, AppError>;
