//! HTTP error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use gamepool_core::PoolError;

/// API error type.
///
/// Every failure answers 400 except cursor exhaustion, which answers 401 so
/// callers can tell it apart without parsing the body.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The cursor has no more rows in the requested direction.
    #[error("query cursor reached the end")]
    Exhausted,

    /// The job was cancelled or the service is shutting down.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The store failed.
    #[error("store error: {0}")]
    Store(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Self::Exhausted => (StatusCode::UNAUTHORIZED, "exhausted"),
            Self::Unavailable(_) => (StatusCode::BAD_REQUEST, "unavailable"),
            Self::Store(msg) => {
                tracing::error!(error = %msg, "store failure");
                (StatusCode::BAD_REQUEST, "store_error")
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: self.to_string(),
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<PoolError> for ApiError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Validation(msg) => Self::BadRequest(msg),
            PoolError::Exhausted => Self::Exhausted,
            PoolError::Cancelled | PoolError::ShuttingDown => Self::Unavailable(err.to_string()),
            PoolError::Store(msg) => Self::Store(msg),
        }
    }
}
