//! Request dispatch for the binary protocol.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::json;

use gamepool_core::{
    decode_request, Account, ClearChannelRequest, Command, GameRequest, PoolError, QueryRequest,
    ResetCounterRequest, Response,
};

use crate::pool::JobHandler;
use crate::service::PoolService;

/// Decodes request payloads and routes them to the [`PoolService`].
pub struct Dispatcher {
    service: Arc<PoolService>,
}

fn parse<T: DeserializeOwned>(body: &[u8]) -> Result<T, PoolError> {
    Ok(serde_json::from_slice(body)?)
}

fn to_data<T: serde::Serialize>(value: &T) -> Result<Response, PoolError> {
    Ok(Response::ok_with(serde_json::to_value(value)?))
}

impl Dispatcher {
    /// Create a dispatcher over `service`.
    #[must_use]
    pub fn new(service: Arc<PoolService>) -> Self {
        Self { service }
    }

    /// Execute one decoded command.
    ///
    /// # Errors
    ///
    /// Returns whatever the service returns, or `Validation` for a body that
    /// does not parse.
    pub async fn dispatch(&self, command: Command, body: &[u8]) -> Result<Response, PoolError> {
        let service = &self.service;
        match command {
            Command::CreateTable => {
                service.create_game(&parse::<GameRequest>(body)?).await?;
                Ok(Response::ok())
            }
            Command::Insert => {
                service.insert(parse::<Account>(body)?).await?;
                Ok(Response::ok())
            }
            Command::Update => {
                let rows = service.update(parse::<Account>(body)?).await?;
                Ok(Response::ok_with(json!({ "rows": rows })))
            }
            Command::Query => to_data(&service.query(&parse::<QueryRequest>(body)?).await?),
            Command::ClearChannel => {
                let rows = service
                    .clear_channel(&parse::<ClearChannelRequest>(body)?)
                    .await?;
                Ok(Response::ok_with(json!({ "rows": rows })))
            }
            Command::QueryNoUpdate => {
                to_data(&service.query_no_update(&parse::<QueryRequest>(body)?).await?)
            }
            Command::Delete => {
                let rows = service.delete(&parse::<Account>(body)?).await?;
                Ok(Response::ok_with(json!({ "rows": rows })))
            }
            Command::ResetCounter => to_data(
                &service
                    .reset_counter(&parse::<ResetCounterRequest>(body)?)
                    .await?,
            ),
        }
    }
}

#[async_trait]
impl JobHandler for Dispatcher {
    async fn handle(&self, payload: Bytes) -> Response {
        let result = match decode_request(&payload) {
            Ok((command, body)) => {
                tracing::trace!(?command, len = body.len(), "dispatching");
                self.dispatch(command, body).await
            }
            Err(e) => Err(e),
        };

        result.unwrap_or_else(|e| {
            match &e {
                PoolError::Store(_) => tracing::error!(error = %e, "request failed"),
                PoolError::Exhausted => {}
                _ => tracing::debug!(error = %e, "request rejected"),
            }
            Response::from_error(&e)
        })
    }
}
