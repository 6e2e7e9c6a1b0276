//! Error types for gamepool storage.

use gamepool_core::PoolError;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// The game table has not been created.
    #[error("game table {0} does not exist")]
    NoSuchGame(String),
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<StoreError> for PoolError {
    fn from(err: StoreError) -> Self {
        Self::Store(err.to_string())
    }
}
