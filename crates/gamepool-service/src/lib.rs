//! Gamepool service.
//!
//! This crate runs the account pool behind two front ends:
//!
//! - A binary protocol over TCP, served by a priority worker pool
//! - An HTTP adapter with one POST endpoint per command
//!
//! Both front ends share a single [`PoolService`], which owns the insert
//! write-back buffer, the cursor engine, and the cooldown update queue.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Health handler is async for the router

pub mod config;
pub mod cooldown;
pub mod cursor;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod insert_buffer;
pub mod locks;
pub mod pool;
pub mod routes;
pub mod service;
pub mod state;
pub mod tcp;

pub use config::{CacheConfig, ServiceConfig};
pub use dispatcher::Dispatcher;
pub use error::ApiError;
pub use pool::{Job, JobHandler, JobKind, WorkerPool};
pub use routes::create_router;
pub use service::PoolService;
pub use state::AppState;
