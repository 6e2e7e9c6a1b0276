//! Binary protocol client.
//!
//! One request is in flight at a time per [`TcpClient`]; open several
//! clients for parallelism.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};

use gamepool_core::{
    encode_request, Account, ClearChannelRequest, Command, Counter, FrameBuffer, GameRequest,
    QueryRequest, ResetCounterRequest, Response,
};

use crate::error::ClientError;
use crate::types::RowsAffected;

/// Connection to the gamepool binary protocol listener.
#[derive(Debug)]
pub struct TcpClient {
    stream: TcpStream,
    buffer: FrameBuffer,
}

impl TcpClient {
    /// Connect to `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Io`] if the connection fails.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            buffer: FrameBuffer::new(),
        })
    }

    /// Send one command and wait for its raw response.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket fails or the response is malformed.
    /// A failure response from the server is returned as `Ok`.
    pub async fn request<B: Serialize>(
        &mut self,
        command: Command,
        body: &B,
    ) -> Result<Response, ClientError> {
        let frame = encode_request(command, body)?;
        self.stream.write_all(&frame).await?;

        let mut chunk = [0_u8; 8 * 1024];
        loop {
            if let Some(payload) = self.buffer.next_frame()? {
                return Ok(Response::decode(&payload)?);
            }
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(ClientError::Protocol(
                    "connection closed before the response arrived".into(),
                ));
            }
            self.buffer.feed(&chunk[..n]);
        }
    }

    async fn call<B: Serialize, T: DeserializeOwned>(
        &mut self,
        command: Command,
        body: &B,
    ) -> Result<Option<T>, ClientError> {
        let response = self.request(command, body).await?;
        if response.is_exhausted() {
            return Err(ClientError::Exhausted);
        }
        if !response.is_ok() {
            return Err(ClientError::Failed(response.err_msg.unwrap_or_default()));
        }
        response
            .data
            .map(serde_json::from_value)
            .transpose()
            .map_err(ClientError::from)
    }

    /// Create a game table.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn create_game(&mut self, game_name: impl Into<String>) -> Result<(), ClientError> {
        let request = GameRequest {
            game_name: game_name.into(),
        };
        self.call::<_, serde_json::Value>(Command::CreateTable, &request)
            .await
            .map(|_| ())
    }

    /// Buffer an account insert.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn insert(&mut self, account: &Account) -> Result<(), ClientError> {
        self.call::<_, serde_json::Value>(Command::Insert, account)
            .await
            .map(|_| ())
    }

    /// Refresh an existing account. Returns the number of records touched.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn update(&mut self, account: &Account) -> Result<u64, ClientError> {
        let rows: Option<RowsAffected> = self.call(Command::Update, account).await?;
        Ok(rows.unwrap_or_default().rows)
    }

    /// Filter query, optionally gated on a cooldown channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn query(&mut self, request: &QueryRequest) -> Result<Vec<Account>, ClientError> {
        let rows: Option<Vec<Account>> = self.call(Command::Query, request).await?;
        Ok(rows.unwrap_or_default())
    }

    /// Consume the next rows from the game's cursor.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Exhausted`] when fewer than `cnt` rows remain.
    pub async fn query_no_update(
        &mut self,
        request: &QueryRequest,
    ) -> Result<Vec<Account>, ClientError> {
        let rows: Option<Vec<Account>> = self.call(Command::QueryNoUpdate, request).await?;
        Ok(rows.unwrap_or_default())
    }

    /// Delete an account. Returns the number of records removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn delete(&mut self, account: &Account) -> Result<u64, ClientError> {
        let rows: Option<RowsAffected> = self.call(Command::Delete, account).await?;
        Ok(rows.unwrap_or_default().rows)
    }

    /// Reset both cursors of a game.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn reset_counter(
        &mut self,
        game_name: impl Into<String>,
        desc_counter: Option<i64>,
    ) -> Result<Counter, ClientError> {
        let request = ResetCounterRequest {
            game_name: game_name.into(),
            desc_counter,
        };
        let counter: Option<Counter> = self.call(Command::ResetCounter, &request).await?;
        counter.ok_or_else(|| ClientError::Protocol("reset response without counter".into()))
    }

    /// Clear one cooldown channel for every row of a game.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn clear_channel(
        &mut self,
        game_name: impl Into<String>,
        talk_channel: u32,
    ) -> Result<u64, ClientError> {
        let request = ClearChannelRequest {
            game_name: game_name.into(),
            talk_channel,
        };
        let rows: Option<RowsAffected> = self.call(Command::ClearChannel, &request).await?;
        Ok(rows.unwrap_or_default().rows)
    }
}
