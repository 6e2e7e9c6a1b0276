//! Storage layer for gamepool.
//!
//! Each game owns one table of account rows with an auto-increment id, and
//! one shared table keeps the persisted cursor positions per game.
//!
//! # Backends
//!
//! - [`PgStore`]: PostgreSQL via `sqlx` (feature `postgres`, on by default)
//! - [`MemoryStore`]: in-process maps, used by tests and local runs
//!
//! # Example
//!
//! ```no_run
//! use gamepool_core::{Account, AccountFilter, GameName};
//! use gamepool_store::{MemoryStore, Store};
//!
//! # async fn example() -> gamepool_store::Result<()> {
//! let store = MemoryStore::new();
//! let game = GameName::new("fifa").unwrap();
//!
//! store.create_game_table(&game).await?;
//! store.upsert_accounts(&game, &[Account::new("fifa", "a1")]).await?;
//!
//! let rows = store
//!     .query_accounts(&game, &AccountFilter::all(10), chrono::Utc::now())
//!     .await?;
//! assert_eq!(rows.len(), 1);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use gamepool_core::{Account, AccountFilter, CooldownChannel, Counter, Direction, GameName};

/// The storage trait defining all database operations.
///
/// Implementations do no locking of their own beyond what a single statement
/// needs; the service serialises conflicting operations per game.
#[async_trait]
pub trait Store: Send + Sync {
    // =========================================================================
    // Tables
    // =========================================================================

    /// Create the game table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn create_game_table(&self, game: &GameName) -> Result<()>;

    /// Number of rows in the game table.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NoSuchGame` if the table does not exist.
    async fn count_rows(&self, game: &GameName) -> Result<i64>;

    // =========================================================================
    // Accounts
    // =========================================================================

    /// Insert accounts, refreshing zones, rating and online time of accounts
    /// that already exist. Runs in one transaction.
    ///
    /// Returns the number of accounts written.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NoSuchGame` if the table does not exist.
    async fn upsert_accounts(&self, game: &GameName, accounts: &[Account]) -> Result<u64>;

    /// Refresh zones, rating and online time of an existing account.
    ///
    /// Returns the number of rows changed (0 when the account is unknown).
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NoSuchGame` if the table does not exist.
    async fn update_account(&self, game: &GameName, account: &Account) -> Result<u64>;

    /// Delete an account by name. Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NoSuchGame` if the table does not exist.
    async fn delete_account(&self, game: &GameName, account: &str) -> Result<u64>;

    /// Rows matching `filter` at `now`, in id order, at most `filter.limit`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NoSuchGame` if the table does not exist.
    async fn query_accounts(
        &self,
        game: &GameName,
        filter: &AccountFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<Account>>;

    /// Rows with `id > after_id`, ascending, at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NoSuchGame` if the table does not exist.
    async fn fetch_after(&self, game: &GameName, after_id: i64, limit: usize)
        -> Result<Vec<Account>>;

    /// The `limit` highest rows with `id <= at_most`, returned ascending.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NoSuchGame` if the table does not exist.
    async fn fetch_before(
        &self,
        game: &GameName,
        at_most: i64,
        limit: usize,
    ) -> Result<Vec<Account>>;

    // =========================================================================
    // Cooldown channels
    // =========================================================================

    /// Stamp `channel` with `at` on every row in `ids`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NoSuchGame` if the table does not exist.
    async fn set_channel_time(
        &self,
        game: &GameName,
        ids: &[i64],
        channel: CooldownChannel,
        at: DateTime<Utc>,
    ) -> Result<u64>;

    /// Unset `channel` on every row of the game.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NoSuchGame` if the table does not exist.
    async fn clear_channel(&self, game: &GameName, channel: CooldownChannel) -> Result<u64>;

    // =========================================================================
    // Counters
    // =========================================================================

    /// Load the persisted counter, creating `{asc: 0, desc: NULL}` if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn load_counter(&self, game: &GameName) -> Result<Counter>;

    /// Persist one direction of the counter.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn save_counter(&self, game: &GameName, direction: Direction, value: i64) -> Result<()>;
}
