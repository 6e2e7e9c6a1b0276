//! Account pool handlers.
//!
//! Each endpoint mirrors one protocol command and takes the same JSON body.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::json;

use gamepool_core::{
    Account, ClearChannelRequest, GameRequest, PoolError, QueryRequest, ResetCounterRequest,
};

use crate::error::ApiError;
use crate::state::AppState;

/// Success response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    /// Human readable outcome.
    pub message: String,
    /// Operation result, if it has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl MessageResponse {
    fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
            data: None,
        })
    }

    fn with_data<T: Serialize>(message: &str, data: &T) -> Result<Json<Self>, ApiError> {
        let data = serde_json::to_value(data).map_err(PoolError::from)?;
        Ok(Json(Self {
            message: message.to_string(),
            data: Some(data),
        }))
    }
}

/// Create a game table.
pub async fn create_game(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GameRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.service.create_game(&body).await?;
    Ok(MessageResponse::new("game created"))
}

/// Buffer an account insert.
pub async fn insert(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Account>,
) -> Result<Json<MessageResponse>, ApiError> {
    let flushed = state.service.insert(body).await?;
    MessageResponse::with_data("account buffered", &json!({ "flushed": flushed }))
}

/// Refresh an existing account.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Account>,
) -> Result<Json<MessageResponse>, ApiError> {
    let rows = state.service.update(body).await?;
    MessageResponse::with_data("account updated", &json!({ "rows": rows }))
}

/// Filter query, optionally gated on a cooldown channel.
pub async fn query(
    State(state): State<Arc<AppState>>,
    Json(body): Json<QueryRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let rows = state.service.query(&body).await?;
    MessageResponse::with_data("ok", &rows)
}

/// Consume the next rows from a cursor.
pub async fn query_no_update(
    State(state): State<Arc<AppState>>,
    Json(body): Json<QueryRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let rows = state.service.query_no_update(&body).await?;
    MessageResponse::with_data("ok", &rows)
}

/// Delete an account.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Account>,
) -> Result<Json<MessageResponse>, ApiError> {
    let rows = state.service.delete(&body).await?;
    MessageResponse::with_data("account deleted", &json!({ "rows": rows }))
}

/// Reset both cursors of a game.
pub async fn reset_counter(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResetCounterRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let counter = state.service.reset_counter(&body).await?;
    MessageResponse::with_data("counter reset", &counter)
}

/// Clear one cooldown channel for every row of a game.
pub async fn clear_channel(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ClearChannelRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let rows = state.service.clear_channel(&body).await?;
    MessageResponse::with_data("channel cleared", &json!({ "rows": rows }))
}
