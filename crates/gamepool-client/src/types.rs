//! Request and response types for the HTTP API.

use serde::Deserialize;

pub use gamepool_core::{
    Account, ClearChannelRequest, Counter, GameRequest, QueryRequest, ResetCounterRequest,
};

/// Successful response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse<T> {
    /// Human readable outcome.
    pub message: String,
    /// Operation result, if it has one.
    pub data: Option<T>,
}

/// Rows touched by a write.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RowsAffected {
    /// Number of rows.
    pub rows: u64,
}

/// Result of an insert.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct InsertOutcome {
    /// Accounts written to the table by this call. Zero while buffered.
    pub flushed: u64,
}

/// Health check response.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Service version.
    pub version: String,
}

/// API error response.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

/// API error body.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub code: String,
    pub message: String,
}
