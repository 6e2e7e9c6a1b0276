//! Client error types.

use gamepool_core::{FrameError, PoolError};

/// Errors that can occur when using the gamepool clients.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
    },

    /// The cursor has no more rows in the requested direction.
    #[error("query cursor reached the end")]
    Exhausted,

    /// The binary protocol server answered with a failure.
    #[error("request failed: {0}")]
    Failed(String),

    /// Socket error on the binary protocol connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server sent something that is not a valid frame or response.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<FrameError> for ClientError {
    fn from(err: FrameError) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<PoolError> for ClientError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Exhausted => Self::Exhausted,
            other => Self::Protocol(other.to_string()),
        }
    }
}
