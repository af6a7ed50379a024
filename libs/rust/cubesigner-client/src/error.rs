//! CubeSigner API error types.
//!
//! Separates failures to reach the API from failures reported by it and
//! from bodies that do not match the expected model.

use thiserror::Error;

/// CubeSigner API errors.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Network failure reaching the API (connect, timeout, broken body)
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("Unexpected status code: {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Error message from the response body, if any
        message: String,
    },

    /// Successful response whose body does not match the model
    #[error("Decode error: {0}")]
    Decode(String),

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for CubeSigner API operations.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Check if error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Decode(_) | Self::InvalidConfig(_) => false,
        }
    }

    /// Create a status error.
    #[must_use]
    pub fn status_error(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Create a decode error.
    #[must_use]
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}
