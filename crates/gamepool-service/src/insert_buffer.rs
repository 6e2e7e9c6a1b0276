//! Write-back buffer for inserts.
//!
//! Inserts are collected per game, keyed by account name so a second insert of
//! the same account overwrites the pending snapshot. A game's map is staged in
//! one piece, either when it reaches the threshold or on the periodic tick.
//! The flusher takes the staged batch under the game's table lock, so an
//! update or delete that reached the buffer first is always part of it, and
//! one that missed it runs against the table after the batch is written.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use gamepool_core::{Account, GameName};

use crate::locks::{insert_buffer_key, LockRegistry};

/// Pending account snapshots per game.
pub struct InsertBuffer {
    pending: DashMap<GameName, HashMap<String, Account>>,
    staged: DashMap<GameName, HashMap<String, Account>>,
    locks: Arc<LockRegistry>,
    threshold: usize,
}

impl InsertBuffer {
    /// Create a buffer that stages a game once it holds `threshold` accounts.
    #[must_use]
    pub fn new(locks: Arc<LockRegistry>, threshold: usize) -> Self {
        Self {
            pending: DashMap::new(),
            staged: DashMap::new(),
            locks,
            threshold: threshold.max(1),
        }
    }

    /// Buffer `account`. Returns `true` when the threshold was reached and
    /// the game's batch was staged for flushing.
    pub async fn buffer_insert(&self, game: &GameName, account: Account) -> bool {
        let _guard = self.locks.acquire(&insert_buffer_key(game)).await;

        let mut entry = self.pending.entry(game.clone()).or_default();
        entry.insert(account.account.clone(), account);
        if entry.len() < self.threshold {
            return false;
        }
        let batch = std::mem::take(&mut *entry);
        drop(entry);

        tracing::debug!(game = %game, count = batch.len(), "insert buffer reached threshold");
        self.stage(game, batch);
        true
    }

    fn stage(&self, game: &GameName, batch: HashMap<String, Account>) {
        self.staged.entry(game.clone()).or_default().extend(batch);
    }

    /// Stage every game's pending map. Returns the games with a staged batch.
    pub async fn stage_all(&self) -> Vec<GameName> {
        let games: Vec<GameName> = self.pending.iter().map(|e| e.key().clone()).collect();

        let mut staged = Vec::with_capacity(games.len());
        for game in games {
            let _guard = self.locks.acquire(&insert_buffer_key(&game)).await;
            let drained = self
                .pending
                .get_mut(&game)
                .map(|mut entry| std::mem::take(&mut *entry))
                .unwrap_or_default();
            if !drained.is_empty() {
                self.stage(&game, drained);
                staged.push(game);
            }
        }
        staged
    }

    /// Take the staged batch of `game`. Call with the game's table lock held.
    pub fn take_staged(&self, game: &GameName) -> Vec<Account> {
        self.staged
            .remove(game)
            .map(|(_, batch)| batch.into_values().collect())
            .unwrap_or_default()
    }

    /// Overwrite the refreshable fields of a buffered snapshot, pending or
    /// staged. Returns whether a snapshot was found.
    pub async fn refresh_pending(&self, game: &GameName, account: &Account) -> bool {
        let _guard = self.locks.acquire(&insert_buffer_key(game)).await;
        let refresh = |map: &DashMap<GameName, HashMap<String, Account>>| {
            map.get_mut(game)
                .and_then(|mut entry| {
                    entry
                        .get_mut(&account.account)
                        .map(|buffered| buffered.refresh_from(account))
                })
                .is_some()
        };
        let pending = refresh(&self.pending);
        let staged = refresh(&self.staged);
        pending || staged
    }

    /// Drop a buffered snapshot, pending or staged. Returns whether one was
    /// removed.
    pub async fn remove_pending(&self, game: &GameName, account: &str) -> bool {
        let _guard = self.locks.acquire(&insert_buffer_key(game)).await;
        let remove = |map: &DashMap<GameName, HashMap<String, Account>>| {
            map.get_mut(game)
                .and_then(|mut entry| entry.remove(account))
                .is_some()
        };
        let pending = remove(&self.pending);
        let staged = remove(&self.staged);
        pending || staged
    }

    /// Put a batch whose flush failed back into the buffer.
    ///
    /// Snapshots buffered since the batch was taken are newer and win.
    pub async fn restore(&self, game: &GameName, batch: Vec<Account>) {
        let _guard = self.locks.acquire(&insert_buffer_key(game)).await;
        let mut entry = self.pending.entry(game.clone()).or_default();
        for account in batch {
            entry.entry(account.account.clone()).or_insert(account);
        }
    }

    /// Number of buffered snapshots for `game` not yet written.
    #[must_use]
    pub fn pending_len(&self, game: &GameName) -> usize {
        let pending = self.pending.get(game).map_or(0, |entry| entry.len());
        let staged = self.staged.get(game).map_or(0, |entry| entry.len());
        pending + staged
    }
}
