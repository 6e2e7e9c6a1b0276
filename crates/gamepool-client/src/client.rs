//! Gamepool HTTP client implementation.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use crate::error::ClientError;
use crate::types::{
    Account, ApiErrorResponse, ClearChannelRequest, Counter, GameRequest, HealthResponse,
    InsertOutcome, MessageResponse, QueryRequest, ResetCounterRequest, RowsAffected,
};

/// Gamepool HTTP API client.
#[derive(Debug, Clone)]
pub struct GamePoolClient {
    client: Client,
    base_url: String,
}

impl GamePoolClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the gamepool HTTP adapter (e.g., `"http://gamepool:8080"`)
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_options(base_url, ClientOptions::default())
    }

    /// Create a new client with custom options.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] if the HTTP client cannot be built.
    pub fn with_options(
        base_url: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Check service health.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// Create a game table.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn create_game(&self, game_name: impl Into<String>) -> Result<(), ClientError> {
        let request = GameRequest {
            game_name: game_name.into(),
        };
        self.post::<_, serde_json::Value>("/createNewGame", &request)
            .await
            .map(|_| ())
    }

    /// Buffer an account insert. Returns how many accounts this call flushed.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn insert(&self, account: &Account) -> Result<u64, ClientError> {
        let outcome: Option<InsertOutcome> = self.post("/insert", account).await?;
        Ok(outcome.unwrap_or_default().flushed)
    }

    /// Refresh an existing account. Returns the number of records touched.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn update(&self, account: &Account) -> Result<u64, ClientError> {
        let rows: Option<RowsAffected> = self.post("/update", account).await?;
        Ok(rows.unwrap_or_default().rows)
    }

    /// Filter query, optionally gated on a cooldown channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn query(&self, request: &QueryRequest) -> Result<Vec<Account>, ClientError> {
        let rows: Option<Vec<Account>> = self.post("/query", request).await?;
        Ok(rows.unwrap_or_default())
    }

    /// Consume the next rows from the game's cursor.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Exhausted`] when fewer than `cnt` rows remain,
    /// or another error if the request fails.
    pub async fn query_no_update(
        &self,
        request: &QueryRequest,
    ) -> Result<Vec<Account>, ClientError> {
        let rows: Option<Vec<Account>> = self.post("/queryNoUpdate", request).await?;
        Ok(rows.unwrap_or_default())
    }

    /// Delete an account. Returns the number of records removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn delete(&self, account: &Account) -> Result<u64, ClientError> {
        let rows: Option<RowsAffected> = self.post("/delete", account).await?;
        Ok(rows.unwrap_or_default().rows)
    }

    /// Reset both cursors of a game.
    ///
    /// `desc_counter` sets the descending start; `None` uses the row count.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn reset_counter(
        &self,
        game_name: impl Into<String>,
        desc_counter: Option<i64>,
    ) -> Result<Counter, ClientError> {
        let request = ResetCounterRequest {
            game_name: game_name.into(),
            desc_counter,
        };
        let counter: Option<Counter> = self.post("/resetQueryCounter", &request).await?;
        counter.ok_or_else(|| ClientError::Protocol("reset response without counter".into()))
    }

    /// Clear one cooldown channel for every row of a game.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn clear_channel(
        &self,
        game_name: impl Into<String>,
        talk_channel: u32,
    ) -> Result<u64, ClientError> {
        let request = ClearChannelRequest {
            game_name: game_name.into(),
            talk_channel,
        };
        let rows: Option<RowsAffected> = self.post("/clearTalkChannel", &request).await?;
        Ok(rows.unwrap_or_default().rows)
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<T>, ClientError> {
        let url = format!("{}{path}", self.base_url);
        let response = self.client.post(&url).json(body).send().await?;
        let envelope: MessageResponse<T> = self.handle_response(response).await?;
        tracing::trace!(path, message = %envelope.message, "gamepool call ok");
        Ok(envelope.data)
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let error_body: Result<ApiErrorResponse, _> = response.json().await;

        match error_body {
            Ok(api_error) => match api_error.error.code.as_str() {
                "exhausted" => Err(ClientError::Exhausted),
                code => Err(ClientError::Api {
                    code: code.to_string(),
                    message: api_error.error.message,
                    status: status.as_u16(),
                }),
            },
            Err(_) => Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            }),
        }
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 30).
    pub timeout_seconds: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
        }
    }
}
