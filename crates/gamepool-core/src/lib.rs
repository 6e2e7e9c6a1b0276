//! Core types and wire format for gamepool.
//!
//! This crate provides the foundational types shared by the store, the service
//! and the client:
//!
//! - **Identifiers**: `GameName` (validated table name)
//! - **Accounts**: `Account`, `CooldownChannel`
//! - **Queries**: `QueryRequest`, `AccountFilter`, `ResetCounterRequest`
//! - **Cursors**: `Direction`, `Counter`
//! - **Wire**: `FrameBuffer`, `Command`, `Response`
//!
//! # Frames
//!
//! ```text
//! request : u32_le(total) | u8(command) | JSON body
//! response: u32_le(total) | JSON {code, data?, err_msg?}
//! ```
//!
//! `total` always includes the 4-byte header.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod channel;
pub mod counter;
pub mod error;
pub mod frame;
pub mod ids;
pub mod protocol;
pub mod query;

pub use account::Account;
pub use channel::CooldownChannel;
pub use counter::{crosses_multiple, Counter, Direction};
pub use error::{PoolError, Result};
pub use frame::{encode_frame, FrameBuffer, FrameError, DEFAULT_MAX_FRAME_BYTES, HEADER_LEN};
pub use ids::{validate_account, GameName, IdError, MAX_GAME_NAME_LEN};
pub use protocol::{decode_request, encode_request, Command, Response, EXHAUSTED_MESSAGE};
pub use query::{
    AccountFilter, ClearChannelRequest, GameRequest, QueryRequest, ResetCounterRequest,
};
