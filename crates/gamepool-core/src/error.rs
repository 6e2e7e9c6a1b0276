//! Error types for gamepool.

use crate::ids::IdError;

/// Result type for gamepool operations.
pub type Result<T> = std::result::Result<T, PoolError>;

/// Errors surfaced by the account pool to its callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// The request was malformed. Rejected before any lock is taken.
    #[error("validation error: {0}")]
    Validation(String),

    /// The cursor has no more rows in the requested direction.
    #[error("query cursor reached the end")]
    Exhausted,

    /// The backing store failed.
    #[error("store error: {0}")]
    Store(String),

    /// The job was cancelled before it started executing.
    #[error("request cancelled")]
    Cancelled,

    /// The service is shutting down and refuses new work.
    #[error("service is shutting down")]
    ShuttingDown,
}

impl PoolError {
    /// Build a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether this error means the cursor ran out of rows.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted)
    }
}

impl From<IdError> for PoolError {
    fn from(err: IdError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<serde_json::Error> for PoolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(format!("invalid JSON body: {err}"))
    }
}
