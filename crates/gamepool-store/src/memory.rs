//! In-memory storage implementation.
//!
//! Mirrors the PostgreSQL backend's semantics (per-game tables, unique
//! account names, monotonically increasing ids) without any I/O. Used by the
//! service tests and for running the service without a database.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use gamepool_core::{Account, AccountFilter, CooldownChannel, Counter, Direction, GameName};

use crate::error::{Result, StoreError};
use crate::Store;

#[derive(Debug, Default)]
struct Table {
    next_id: i64,
    rows: BTreeMap<i64, Account>,
    by_account: HashMap<String, i64>,
}

impl Table {
    fn upsert(&mut self, game: &GameName, account: &Account) {
        if let Some(id) = self.by_account.get(&account.account) {
            if let Some(row) = self.rows.get_mut(id) {
                row.refresh_from(account);
            }
            return;
        }

        self.next_id += 1;
        let id = self.next_id;
        let mut row = account.clone();
        row.id = id;
        row.game_name = game.to_string();
        self.by_account.insert(row.account.clone(), id);
        self.rows.insert(id, row);
    }
}

/// Map-backed storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<GameName, Table>>,
    counters: Mutex<HashMap<GameName, Counter>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_table<T>(&self, game: &GameName, f: impl FnOnce(&mut Table) -> T) -> Result<T> {
        let mut tables = self.tables.lock();
        let table = tables
            .get_mut(game)
            .ok_or_else(|| StoreError::NoSuchGame(game.to_string()))?;
        Ok(f(table))
    }

    /// Snapshot of every row in a game, in id order.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NoSuchGame` if the table does not exist.
    pub fn rows(&self, game: &GameName) -> Result<Vec<Account>> {
        self.with_table(game, |table| table.rows.values().cloned().collect())
    }

    /// Fetch one account by name.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NoSuchGame` if the table does not exist.
    pub fn get_account(&self, game: &GameName, account: &str) -> Result<Option<Account>> {
        self.with_table(game, |table| {
            table
                .by_account
                .get(account)
                .and_then(|id| table.rows.get(id))
                .cloned()
        })
    }

    /// Currently persisted counter, without creating one.
    #[must_use]
    pub fn persisted_counter(&self, game: &GameName) -> Option<Counter> {
        self.counters.lock().get(game).copied()
    }
}

fn cap(limit: usize) -> usize {
    limit.max(1)
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_game_table(&self, game: &GameName) -> Result<()> {
        self.tables.lock().entry(game.clone()).or_default();
        Ok(())
    }

    async fn count_rows(&self, game: &GameName) -> Result<i64> {
        self.with_table(game, |table| {
            i64::try_from(table.rows.len()).unwrap_or(i64::MAX)
        })
    }

    async fn upsert_accounts(&self, game: &GameName, accounts: &[Account]) -> Result<u64> {
        self.with_table(game, |table| {
            for account in accounts {
                table.upsert(game, account);
            }
            accounts.len() as u64
        })
    }

    async fn update_account(&self, game: &GameName, account: &Account) -> Result<u64> {
        self.with_table(game, |table| {
            let Some(id) = table.by_account.get(&account.account) else {
                return 0;
            };
            match table.rows.get_mut(id) {
                Some(row) => {
                    row.refresh_from(account);
                    1
                }
                None => 0,
            }
        })
    }

    async fn delete_account(&self, game: &GameName, account: &str) -> Result<u64> {
        self.with_table(game, |table| match table.by_account.remove(account) {
            Some(id) => u64::from(table.rows.remove(&id).is_some()),
            None => 0,
        })
    }

    async fn query_accounts(
        &self,
        game: &GameName,
        filter: &AccountFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<Account>> {
        self.with_table(game, |table| {
            table
                .rows
                .values()
                .filter(|row| filter.matches(row, now))
                .take(cap(filter.limit))
                .cloned()
                .collect()
        })
    }

    async fn fetch_after(
        &self,
        game: &GameName,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<Account>> {
        self.with_table(game, |table| {
            table
                .rows
                .range(after_id.saturating_add(1)..)
                .take(cap(limit))
                .map(|(_, row)| row.clone())
                .collect()
        })
    }

    async fn fetch_before(
        &self,
        game: &GameName,
        at_most: i64,
        limit: usize,
    ) -> Result<Vec<Account>> {
        self.with_table(game, |table| {
            let mut rows: Vec<Account> = table
                .rows
                .range(..=at_most)
                .rev()
                .take(cap(limit))
                .map(|(_, row)| row.clone())
                .collect();
            rows.reverse();
            rows
        })
    }

    async fn set_channel_time(
        &self,
        game: &GameName,
        ids: &[i64],
        channel: CooldownChannel,
        at: DateTime<Utc>,
    ) -> Result<u64> {
        self.with_table(game, |table| {
            let mut changed = 0;
            for id in ids {
                if let Some(row) = table.rows.get_mut(id) {
                    channel.set_timestamp(row, Some(at));
                    changed += 1;
                }
            }
            changed
        })
    }

    async fn clear_channel(&self, game: &GameName, channel: CooldownChannel) -> Result<u64> {
        self.with_table(game, |table| {
            for row in table.rows.values_mut() {
                channel.set_timestamp(row, None);
            }
            table.rows.len() as u64
        })
    }

    async fn load_counter(&self, game: &GameName) -> Result<Counter> {
        Ok(*self.counters.lock().entry(game.clone()).or_default())
    }

    async fn save_counter(&self, game: &GameName, direction: Direction, value: i64) -> Result<()> {
        let mut counters = self.counters.lock();
        let counter = counters.entry(game.clone()).or_default();
        match direction {
            Direction::Asc => counter.asc = value,
            Direction::Desc => counter.desc = Some(value),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn game() -> GameName {
        GameName::new("fifa").unwrap()
    }

    async fn seeded(n: usize) -> MemoryStore {
        let store = MemoryStore::new();
        store.create_game_table(&game()).await.unwrap();
        let accounts: Vec<Account> = (1..=n)
            .map(|i| Account::new("fifa", format!("acc{i}")))
            .collect();
        store.upsert_accounts(&game(), &accounts).await.unwrap();
        store
    }

    #[tokio::test]
    async fn missing_table_is_reported() {
        let store = MemoryStore::new();
        let err = store.count_rows(&game()).await.unwrap_err();
        assert!(matches!(err, StoreError::NoSuchGame(name) if name == "fifa"));
    }

    #[tokio::test]
    async fn upsert_refreshes_existing_rows() {
        let store = seeded(2).await;
        let mut refreshed = Account::new("fifa", "acc1");
        refreshed.rating = 9;
        refreshed.b_zone = "eu".into();
        store.upsert_accounts(&game(), &[refreshed]).await.unwrap();

        assert_eq!(store.count_rows(&game()).await.unwrap(), 2);
        let row = store.get_account(&game(), "acc1").unwrap().unwrap();
        assert_eq!(row.id, 1);
        assert_eq!(row.rating, 9);
        assert_eq!(row.b_zone, "eu");
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() {
        let store = seeded(3).await;
        assert_eq!(store.delete_account(&game(), "acc3").await.unwrap(), 1);
        assert_eq!(store.delete_account(&game(), "acc3").await.unwrap(), 0);

        store
            .upsert_accounts(&game(), &[Account::new("fifa", "acc4")])
            .await
            .unwrap();
        let row = store.get_account(&game(), "acc4").unwrap().unwrap();
        assert_eq!(row.id, 4);
    }

    #[tokio::test]
    async fn update_unknown_account_changes_nothing() {
        let store = seeded(1).await;
        let changed = store
            .update_account(&game(), &Account::new("fifa", "ghost"))
            .await
            .unwrap();
        assert_eq!(changed, 0);
    }

    #[tokio::test]
    async fn keyset_fetches() {
        let store = seeded(10).await;

        let ids: Vec<i64> = store
            .fetch_after(&game(), 4, 3)
            .await
            .unwrap()
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![5, 6, 7]);

        let ids: Vec<i64> = store
            .fetch_before(&game(), 10, 3)
            .await
            .unwrap()
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![8, 9, 10]);
    }

    #[tokio::test]
    async fn channel_stamp_and_clear() {
        let store = seeded(3).await;
        let now = Utc::now();
        store
            .set_channel_time(&game(), &[1, 3], CooldownChannel::Channel2, now)
            .await
            .unwrap();

        let mut filter = AccountFilter::all(10);
        filter.cooldown = Some((CooldownChannel::Channel2, Duration::minutes(5)));
        let ids: Vec<i64> = store
            .query_accounts(&game(), &filter, now)
            .await
            .unwrap()
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![2]);

        store
            .clear_channel(&game(), CooldownChannel::Channel2)
            .await
            .unwrap();
        let rows = store.query_accounts(&game(), &filter, now).await.unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[tokio::test]
    async fn counters_start_unset() {
        let store = MemoryStore::new();
        let counter = store.load_counter(&game()).await.unwrap();
        assert_eq!(counter, Counter::default());

        store
            .save_counter(&game(), Direction::Desc, 7)
            .await
            .unwrap();
        assert_eq!(
            store.persisted_counter(&game()),
            Some(Counter {
                asc: 0,
                desc: Some(7)
            })
        );
    }
}
