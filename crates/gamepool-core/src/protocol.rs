//! Binary request/response protocol.
//!
//! A request frame is `u32_le(total) || u8(command) || JSON(body)`, a
//! response frame is `u32_le(total) || JSON(Response)`.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::PoolError;
use crate::frame::encode_frame;

/// Command byte of a request frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Create the game table.
    CreateTable = 1,
    /// Buffer an account insert.
    Insert = 2,
    /// Refresh an existing account.
    Update = 3,
    /// Filter query, optionally gated on a cooldown channel.
    Query = 4,
    /// Clear one cooldown channel for every row of a game.
    ClearChannel = 5,
    /// Consume the next rows from a cursor.
    QueryNoUpdate = 6,
    /// Delete an account.
    Delete = 7,
    /// Reset both cursors of a game.
    ResetCounter = 8,
}

impl Command {
    /// Whether jobs for this command go to the high-priority queue.
    #[must_use]
    pub const fn is_query(self) -> bool {
        matches!(self, Self::Query | Self::QueryNoUpdate)
    }
}

impl TryFrom<u8> for Command {
    type Error = PoolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => Self::CreateTable,
            2 => Self::Insert,
            3 => Self::Update,
            4 => Self::Query,
            5 => Self::ClearChannel,
            6 => Self::QueryNoUpdate,
            7 => Self::Delete,
            8 => Self::ResetCounter,
            other => return Err(PoolError::validation(format!("unknown command {other}"))),
        })
    }
}

/// Build a complete request frame.
///
/// # Errors
///
/// Returns [`PoolError::Validation`] if the body cannot be serialized or the
/// frame is too large.
pub fn encode_request<T: Serialize>(command: Command, body: &T) -> Result<Bytes, PoolError> {
    let json = serde_json::to_vec(body)?;
    let mut payload = BytesMut::with_capacity(json.len() + 1);
    payload.put_u8(command as u8);
    payload.put_slice(&json);
    encode_frame(&payload).map_err(|e| PoolError::validation(e.to_string()))
}

/// Split a request payload (header already stripped) into command and body.
///
/// # Errors
///
/// Returns [`PoolError::Validation`] for an empty payload or unknown command.
pub fn decode_request(payload: &[u8]) -> Result<(Command, &[u8]), PoolError> {
    let (&first, body) = payload
        .split_first()
        .ok_or_else(|| PoolError::validation("empty request frame"))?;
    Ok((Command::try_from(first)?, body))
}

/// Response status on the wire.
pub const CODE_OK: u8 = 0;
/// Response status for any failure.
pub const CODE_FAILED: u8 = 1;

/// Body of a response frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// `0` on success, `1` on failure.
    pub code: u8,

    /// Operation result, if it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err_msg: Option<String>,
}

impl Response {
    /// Success without data.
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            code: CODE_OK,
            data: None,
            err_msg: None,
        }
    }

    /// Success carrying `data`.
    #[must_use]
    pub fn ok_with(data: serde_json::Value) -> Self {
        Self {
            code: CODE_OK,
            data: Some(data),
            err_msg: None,
        }
    }

    /// Failure with a message.
    #[must_use]
    pub fn fail(msg: impl Into<String>) -> Self {
        Self {
            code: CODE_FAILED,
            data: None,
            err_msg: Some(msg.into()),
        }
    }

    /// Failure describing `err`.
    #[must_use]
    pub fn from_error(err: &PoolError) -> Self {
        Self::fail(err.to_string())
    }

    /// Whether the call succeeded.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.code == CODE_OK
    }

    /// Whether the failure was cursor exhaustion.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        !self.is_ok() && self.err_msg.as_deref() == Some(EXHAUSTED_MESSAGE)
    }

    /// Serialize into a complete response frame.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Validation`] if serialization fails or the frame
    /// is too large.
    pub fn encode(&self) -> Result<Bytes, PoolError> {
        let json = serde_json::to_vec(self)?;
        encode_frame(&json).map_err(|e| PoolError::validation(e.to_string()))
    }

    /// Parse a response payload (header already stripped).
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Validation`] for malformed JSON.
    pub fn decode(payload: &[u8]) -> Result<Self, PoolError> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// `err_msg` carried by an exhausted cursor.
pub const EXHAUSTED_MESSAGE: &str = "query cursor reached the end";
