//! Gamepool Client SDK.
//!
//! Two clients for the gamepool service: [`GamePoolClient`] talks to the HTTP
//! adapter, [`TcpClient`] speaks the binary frame protocol.
//!
//! # Example
//!
//! ```no_run
//! use gamepool_client::{Account, GamePoolClient, QueryRequest};
//!
//! # async fn example() -> Result<(), gamepool_client::ClientError> {
//! let client = GamePoolClient::new("http://gamepool:8080")?;
//!
//! client.create_game("fifa").await?;
//! client.insert(&Account::new("fifa", "player-1")).await?;
//!
//! // Hand out the next ten accounts, oldest first
//! let accounts = client.query_no_update(&QueryRequest::new("fifa", 10)).await?;
//! println!("got {} accounts", accounts.len());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod tcp;
mod types;

pub use client::{ClientOptions, GamePoolClient};
pub use error::ClientError;
pub use tcp::TcpClient;
pub use types::*;
