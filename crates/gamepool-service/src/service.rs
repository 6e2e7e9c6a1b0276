//! The account pool service.
//!
//! [`PoolService`] is the one object both front ends (binary protocol and
//! HTTP) talk to. It owns the lock registry, insert buffer, cursor engine and
//! cooldown queue, and routes each operation through exactly one lock key.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashSet;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use gamepool_core::{
    Account, ClearChannelRequest, Counter, Direction, GameName, GameRequest, PoolError,
    QueryRequest, ResetCounterRequest,
};
use gamepool_store::{Store, StoreError};

use crate::config::CacheConfig;
use crate::cooldown::{CooldownJob, CooldownQueue};
use crate::cursor::CursorEngine;
use crate::insert_buffer::InsertBuffer;
use crate::locks::{table_key, LockRegistry};

/// Account pool operations.
pub struct PoolService {
    store: Arc<dyn Store>,
    locks: Arc<LockRegistry>,
    inserts: InsertBuffer,
    cursors: CursorEngine,
    cooldown: CooldownQueue,
    known_tables: DashSet<GameName>,
    config: CacheConfig,
}

/// Treat a missing table as "nothing matched".
fn zero_if_missing(result: Result<u64, StoreError>) -> Result<u64, PoolError> {
    match result {
        Ok(rows) => Ok(rows),
        Err(StoreError::NoSuchGame(_)) => Ok(0),
        Err(e) => Err(e.into()),
    }
}

impl PoolService {
    /// Build the service and start the cooldown workers.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: CacheConfig) -> Self {
        let locks = Arc::new(LockRegistry::new());
        Self {
            inserts: InsertBuffer::new(Arc::clone(&locks), config.insert_count),
            cursors: CursorEngine::new(
                Arc::clone(&store),
                Arc::clone(&locks),
                config.query_count,
                config.counter_persist_every,
            ),
            cooldown: CooldownQueue::start(
                Arc::clone(&store),
                config.cooldown_workers,
                config.cooldown_queue_size,
            ),
            known_tables: DashSet::new(),
            store,
            locks,
            config,
        }
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Number of accounts waiting in the insert buffer for `game`.
    #[must_use]
    pub fn pending_inserts(&self, game: &GameName) -> usize {
        self.inserts.pending_len(game)
    }

    // =========================================================================
    // Tables
    // =========================================================================

    /// Create a game table.
    ///
    /// # Errors
    ///
    /// `Validation` for a bad game name, `Store` if the DDL fails.
    pub async fn create_game(&self, req: &GameRequest) -> Result<(), PoolError> {
        let game = req.game()?;
        let _guard = self.locks.acquire(&table_key(&game)).await;
        self.store.create_game_table(&game).await?;
        self.known_tables.insert(game.clone());
        tracing::info!(game = %game, "game table created");
        Ok(())
    }

    async fn ensure_table(&self, game: &GameName) -> Result<(), PoolError> {
        if self.known_tables.contains(game) {
            return Ok(());
        }
        self.store.create_game_table(game).await?;
        self.known_tables.insert(game.clone());
        Ok(())
    }

    // =========================================================================
    // Inserts
    // =========================================================================

    /// Buffer an account insert, flushing the game's batch at the threshold.
    ///
    /// Returns the number of accounts flushed by this call (usually 0).
    ///
    /// # Errors
    ///
    /// `Validation` for a bad identity, `Store` if a triggered flush fails.
    /// A failed batch stays buffered for the next flush.
    pub async fn insert(&self, mut account: Account) -> Result<usize, PoolError> {
        let game = account.validate()?;
        account.game_name = game.to_string();
        account.touch(Utc::now());

        if !self.inserts.buffer_insert(&game, account).await {
            return Ok(0);
        }
        self.flush(&game).await
    }

    /// Write the game's staged batch. The batch is taken under the table lock.
    async fn flush(&self, game: &GameName) -> Result<usize, PoolError> {
        let (batch, result) = {
            let _guard = self.locks.acquire(&table_key(game)).await;
            let batch = self.inserts.take_staged(game);
            if batch.is_empty() {
                return Ok(0);
            }
            let result = match self.ensure_table(game).await {
                Ok(()) => self
                    .store
                    .upsert_accounts(game, &batch)
                    .await
                    .map_err(PoolError::from),
                Err(e) => Err(e),
            };
            (batch, result)
        };
        let count = batch.len();

        match result {
            Ok(_) => {
                tracing::debug!(game = %game, count, "insert batch flushed");
                Ok(count)
            }
            Err(e) => {
                tracing::error!(game = %game, count, error = %e, "insert flush failed, batch kept");
                self.inserts.restore(game, batch).await;
                Err(e)
            }
        }
    }

    /// Flush every game's pending inserts. Returns the number of accounts
    /// written; failed batches are logged and kept.
    pub async fn flush_all(&self) -> usize {
        let mut flushed = 0;
        for game in self.inserts.stage_all().await {
            if let Ok(count) = self.flush(&game).await {
                flushed += count;
            }
        }
        flushed
    }

    /// Run [`Self::flush_all`] every `flush_interval` until `shutdown` fires.
    pub fn spawn_flush_task(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let service = Arc::clone(self);
        let period = self.config.flush_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let flushed = service.flush_all().await;
                        if flushed > 0 {
                            tracing::info!(flushed, "periodic insert flush");
                        }
                    }
                }
            }
        })
    }

    // =========================================================================
    // Updates
    // =========================================================================

    /// Refresh zones, rating and online time of an account, both in the
    /// table and in any pending buffered snapshot.
    ///
    /// Returns the number of records touched.
    ///
    /// # Errors
    ///
    /// `Validation` for a bad identity, `Store` if the update fails.
    pub async fn update(&self, mut account: Account) -> Result<u64, PoolError> {
        let game = account.validate()?;
        account.online_time = Some(Utc::now());

        // Buffer first: a batch staged after this point carries the refresh,
        // and one already taken is written before the table lock is ours.
        let pending = self.inserts.refresh_pending(&game, &account).await;
        let rows = {
            let _guard = self.locks.acquire(&table_key(&game)).await;
            zero_if_missing(self.store.update_account(&game, &account).await)?
        };
        Ok(rows + u64::from(pending))
    }

    /// Delete an account from the table and the insert buffer.
    ///
    /// Returns the number of records removed.
    ///
    /// # Errors
    ///
    /// `Validation` for a bad identity, `Store` if the delete fails.
    pub async fn delete(&self, account: &Account) -> Result<u64, PoolError> {
        let game = account.validate()?;

        let pending = self.inserts.remove_pending(&game, &account.account).await;
        let rows = {
            let _guard = self.locks.acquire(&table_key(&game)).await;
            zero_if_missing(self.store.delete_account(&game, &account.account).await)?
        };
        tracing::debug!(game = %game, account = %account.account, rows, pending, "account deleted");
        Ok(rows + u64::from(pending))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Filter query. When a talk channel is given, the returned rows are
    /// stamped on that channel asynchronously.
    ///
    /// # Errors
    ///
    /// `Validation` for a bad request, `Store` if the query fails.
    pub async fn query(&self, req: &QueryRequest) -> Result<Vec<Account>, PoolError> {
        let (game, filter) = req.filter()?;
        let now = Utc::now();

        let rows = {
            let _guard = self.locks.acquire(&table_key(&game)).await;
            self.store.query_accounts(&game, &filter, now).await?
        };

        if let Some((channel, _)) = filter.cooldown {
            if !rows.is_empty() {
                let job = CooldownJob {
                    game: game.clone(),
                    ids: rows.iter().map(|a| a.id).collect(),
                    channel,
                    at: now,
                };
                if let Err(e) = self.cooldown.enqueue(job).await {
                    tracing::warn!(game = %game, error = %e, "cooldown update dropped");
                }
            }
        }
        Ok(rows)
    }

    /// Consume the next rows from the game's cursor.
    ///
    /// # Errors
    ///
    /// `Validation` for a bad game name, `Exhausted` when fewer than `cnt`
    /// rows remain, `Store` if the store fails.
    pub async fn query_no_update(&self, req: &QueryRequest) -> Result<Vec<Account>, PoolError> {
        let game = GameName::new(req.account.game_name.as_str())?;
        let direction = Direction::from_is_desc(req.is_desc);
        self.cursors.consume(&game, direction, req.count()).await
    }

    /// Reset both cursors of a game.
    ///
    /// # Errors
    ///
    /// `Validation` for a bad request, `Store` if the store fails.
    pub async fn reset_counter(&self, req: &ResetCounterRequest) -> Result<Counter, PoolError> {
        let (game, desc) = req.parse()?;
        self.cursors.reset(&game, desc).await
    }

    /// Unset one cooldown channel on every row of a game.
    ///
    /// # Errors
    ///
    /// `Validation` for a bad request, `Store` if the update fails.
    pub async fn clear_channel(&self, req: &ClearChannelRequest) -> Result<u64, PoolError> {
        let (game, channel) = req.parse()?;
        let _guard = self.locks.acquire(&table_key(&game)).await;
        let rows = self.store.clear_channel(&game, channel).await?;
        tracing::info!(game = %game, channel = %channel, rows, "cooldown channel cleared");
        Ok(rows)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Flush pending inserts, persist cursor positions, and drain the
    /// cooldown queue.
    pub async fn shutdown(&self) {
        let flushed = self.flush_all().await;
        tracing::info!(flushed, "pending inserts flushed");
        self.cursors.persist_all().await;
        tracing::info!("cursor counters persisted");
        self.cooldown.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    use chrono::DateTime;
    use gamepool_core::{AccountFilter, CooldownChannel};
    use gamepool_store::MemoryStore;
    use tokio::sync::Notify;

    /// Memory store whose `update_account` and `delete_account` park until
    /// released, holding the caller inside its table lock.
    #[derive(Default)]
    struct GatedStore {
        inner: MemoryStore,
        entered: Notify,
        release: Notify,
    }

    impl GatedStore {
        async fn gate(&self) {
            self.entered.notify_one();
            self.release.notified().await;
        }
    }

    #[async_trait::async_trait]
    impl Store for GatedStore {
        async fn create_game_table(&self, game: &GameName) -> gamepool_store::Result<()> {
            self.inner.create_game_table(game).await
        }

        async fn count_rows(&self, game: &GameName) -> gamepool_store::Result<i64> {
            self.inner.count_rows(game).await
        }

        async fn upsert_accounts(
            &self,
            game: &GameName,
            accounts: &[Account],
        ) -> gamepool_store::Result<u64> {
            self.inner.upsert_accounts(game, accounts).await
        }

        async fn update_account(
            &self,
            game: &GameName,
            account: &Account,
        ) -> gamepool_store::Result<u64> {
            self.gate().await;
            self.inner.update_account(game, account).await
        }

        async fn delete_account(
            &self,
            game: &GameName,
            account: &str,
        ) -> gamepool_store::Result<u64> {
            self.gate().await;
            self.inner.delete_account(game, account).await
        }

        async fn query_accounts(
            &self,
            game: &GameName,
            filter: &AccountFilter,
            now: DateTime<Utc>,
        ) -> gamepool_store::Result<Vec<Account>> {
            self.inner.query_accounts(game, filter, now).await
        }

        async fn fetch_after(
            &self,
            game: &GameName,
            after_id: i64,
            limit: usize,
        ) -> gamepool_store::Result<Vec<Account>> {
            self.inner.fetch_after(game, after_id, limit).await
        }

        async fn fetch_before(
            &self,
            game: &GameName,
            at_most: i64,
            limit: usize,
        ) -> gamepool_store::Result<Vec<Account>> {
            self.inner.fetch_before(game, at_most, limit).await
        }

        async fn set_channel_time(
            &self,
            game: &GameName,
            ids: &[i64],
            channel: CooldownChannel,
            at: DateTime<Utc>,
        ) -> gamepool_store::Result<u64> {
            self.inner.set_channel_time(game, ids, channel, at).await
        }

        async fn clear_channel(
            &self,
            game: &GameName,
            channel: CooldownChannel,
        ) -> gamepool_store::Result<u64> {
            self.inner.clear_channel(game, channel).await
        }

        async fn load_counter(&self, game: &GameName) -> gamepool_store::Result<Counter> {
            self.inner.load_counter(game).await
        }

        async fn save_counter(
            &self,
            game: &GameName,
            direction: Direction,
            value: i64,
        ) -> gamepool_store::Result<()> {
            self.inner.save_counter(game, direction, value).await
        }
    }

    async fn gated_service() -> (Arc<PoolService>, Arc<GatedStore>) {
        let store = Arc::new(GatedStore::default());
        let config = CacheConfig {
            insert_count: 2,
            ..CacheConfig::default()
        };
        let service = PoolService::new(Arc::clone(&store) as Arc<dyn Store>, config);
        service
            .create_game(&GameRequest {
                game_name: "fifa".into(),
            })
            .await
            .unwrap();
        (Arc::new(service), store)
    }

    /// Let spawned tasks on the current-thread runtime run until they park.
    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    fn game() -> GameName {
        GameName::new("fifa").unwrap()
    }

    fn service_with(insert_count: usize) -> (Arc<PoolService>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let config = CacheConfig {
            insert_count,
            query_count: 4,
            ..CacheConfig::default()
        };
        let service = PoolService::new(Arc::clone(&store) as Arc<dyn Store>, config);
        (Arc::new(service), store)
    }

    async fn seeded(rows: usize) -> (Arc<PoolService>, Arc<MemoryStore>) {
        let (service, store) = service_with(rows.max(1));
        for i in 1..=rows {
            service
                .insert(Account::new("fifa", format!("acc{i}")))
                .await
                .unwrap();
        }
        (service, store)
    }

    fn ids(rows: &[Account]) -> Vec<i64> {
        rows.iter().map(|a| a.id).collect()
    }

    #[tokio::test]
    async fn insert_flushes_at_threshold_and_creates_table() {
        let (service, store) = service_with(3);

        assert_eq!(service.insert(Account::new("fifa", "a1")).await.unwrap(), 0);
        assert_eq!(service.insert(Account::new("fifa", "a2")).await.unwrap(), 0);
        assert_eq!(service.pending_inserts(&game()), 2);
        assert!(store.rows(&game()).is_err());

        assert_eq!(service.insert(Account::new("fifa", "a3")).await.unwrap(), 3);
        assert_eq!(service.pending_inserts(&game()), 0);

        let rows = store.rows(&game()).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|a| a.online_time.is_some()));
    }

    #[tokio::test]
    async fn insert_rejects_bad_identity() {
        let (service, _) = service_with(1);
        let err = service.insert(Account::new("fifa", "")).await.unwrap_err();
        assert!(matches!(err, PoolError::Validation(_)));
        let err = service.insert(Account::new("", "a1")).await.unwrap_err();
        assert!(matches!(err, PoolError::Validation(_)));
    }

    #[tokio::test]
    async fn update_and_delete_reach_buffered_accounts() {
        let (service, store) = service_with(10);
        service.insert(Account::new("fifa", "a1")).await.unwrap();

        let mut update = Account::new("fifa", "a1");
        update.rating = 42;
        assert_eq!(service.update(update).await.unwrap(), 1);

        assert_eq!(service.flush_all().await, 1);
        let row = store.get_account(&game(), "a1").unwrap().unwrap();
        assert_eq!(row.rating, 42);

        assert_eq!(service.delete(&Account::new("fifa", "a1")).await.unwrap(), 1);
        assert!(store.get_account(&game(), "a1").unwrap().is_none());
    }

    #[tokio::test]
    async fn update_survives_a_racing_threshold_flush() {
        let (service, store) = gated_service().await;
        service.insert(Account::new("fifa", "a1")).await.unwrap();

        let mut refresh = Account::new("fifa", "a1");
        refresh.rating = 42;
        let update = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.update(refresh).await }
        });
        store.entered.notified().await;

        // a2 reaches the threshold and stages a1 while the update is parked.
        let insert = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.insert(Account::new("fifa", "a2")).await }
        });
        settle().await;

        store.release.notify_one();
        assert_eq!(update.await.unwrap().unwrap(), 1);
        assert_eq!(insert.await.unwrap().unwrap(), 2);

        let row = store.inner.get_account(&game(), "a1").unwrap().unwrap();
        assert_eq!(row.rating, 42);
    }

    #[tokio::test]
    async fn delete_survives_a_racing_threshold_flush() {
        let (service, store) = gated_service().await;
        service.insert(Account::new("fifa", "a1")).await.unwrap();

        let delete = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.delete(&Account::new("fifa", "a1")).await }
        });
        store.entered.notified().await;

        let insert = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.insert(Account::new("fifa", "a2")).await }
        });
        settle().await;

        store.release.notify_one();
        assert_eq!(delete.await.unwrap().unwrap(), 1);
        insert.await.unwrap().unwrap();
        service.flush_all().await;

        assert!(store.inner.get_account(&game(), "a1").unwrap().is_none());
        assert!(store.inner.get_account(&game(), "a2").unwrap().is_some());
    }

    #[tokio::test]
    async fn update_on_missing_table_touches_nothing() {
        let (service, _) = service_with(10);
        assert_eq!(service.update(Account::new("nope", "a1")).await.unwrap(), 0);
        assert_eq!(service.delete(&Account::new("nope", "a1")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn sequential_ascending_consumes() {
        let (service, _) = seeded(10).await;
        let req = QueryRequest::new("fifa", 4);

        let first = service.query_no_update(&req).await.unwrap();
        assert_eq!(ids(&first), vec![1, 2, 3, 4]);
        let second = service.query_no_update(&req).await.unwrap();
        assert_eq!(ids(&second), vec![5, 6, 7, 8]);
        let err = service.query_no_update(&req).await.unwrap_err();
        assert_eq!(err, PoolError::Exhausted);
    }

    #[tokio::test]
    async fn descending_consumes_until_zero() {
        let (service, _) = seeded(10).await;
        let mut req = QueryRequest::new("fifa", 3);
        req.is_desc = true;

        let first = service.query_no_update(&req).await.unwrap();
        assert_eq!(ids(&first), vec![8, 9, 10]);
        assert_eq!(ids(&service.query_no_update(&req).await.unwrap()), vec![5, 6, 7]);
        assert_eq!(ids(&service.query_no_update(&req).await.unwrap()), vec![2, 3, 4]);
        assert_eq!(
            service.query_no_update(&req).await.unwrap_err(),
            PoolError::Exhausted
        );
    }

    #[tokio::test]
    async fn concurrent_consumers_never_share_rows() {
        let (service, _) = seeded(60).await;

        let tasks: Vec<_> = (0..6)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    let req = QueryRequest::new("fifa", 1);
                    let mut seen = Vec::new();
                    loop {
                        match service.query_no_update(&req).await {
                            Ok(rows) => seen.extend(ids(&rows)),
                            Err(PoolError::Exhausted) => break,
                            Err(e) => panic!("unexpected error: {e}"),
                        }
                    }
                    seen
                })
            })
            .collect();

        let mut all = Vec::new();
        for task in tasks {
            all.extend(task.await.unwrap());
        }
        let unique: HashSet<i64> = all.iter().copied().collect();
        assert_eq!(unique.len(), all.len());
        assert_eq!(unique, (1..=60).collect());
    }

    #[tokio::test]
    async fn concurrent_descending_consumers_never_share_rows() {
        let (service, _) = seeded(61).await;

        let tasks: Vec<_> = (0..6)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    let mut req = QueryRequest::new("fifa", 3);
                    req.is_desc = true;
                    let mut seen = Vec::new();
                    loop {
                        match service.query_no_update(&req).await {
                            Ok(rows) => {
                                assert_eq!(rows.len(), 3);
                                seen.extend(ids(&rows));
                            }
                            Err(PoolError::Exhausted) => break,
                            Err(e) => panic!("unexpected error: {e}"),
                        }
                    }
                    seen
                })
            })
            .collect();

        let mut all = Vec::new();
        for task in tasks {
            all.extend(task.await.unwrap());
        }
        let unique: HashSet<i64> = all.iter().copied().collect();
        assert_eq!(unique.len(), all.len());
        assert_eq!(unique, (2..=61).collect());
    }

    #[tokio::test]
    async fn gated_query_stamps_the_channel() {
        let (service, store) = seeded(1).await;
        let mut req = QueryRequest::new("fifa", 10);
        req.online_duration = 10;
        req.talk_channel = 2;

        let rows = service.query(&req).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].account, "acc1");
        assert!(rows[0].last_talk_time2.is_none());

        tokio::time::timeout(Duration::from_secs(5), async {
            while store
                .get_account(&game(), "acc1")
                .unwrap()
                .and_then(|a| a.last_talk_time2)
                .is_none()
            {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert!(service.query(&req).await.unwrap().is_empty());

        let cleared = ClearChannelRequest {
            game_name: "fifa".into(),
            talk_channel: 2,
        };
        assert_eq!(service.clear_channel(&cleared).await.unwrap(), 1);
        assert_eq!(service.query(&req).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reset_rewinds_both_cursors() {
        let (service, store) = seeded(5).await;
        service
            .query_no_update(&QueryRequest::new("fifa", 5))
            .await
            .unwrap();

        let counter = service
            .reset_counter(&ResetCounterRequest {
                game_name: "fifa".into(),
                desc_counter: None,
            })
            .await
            .unwrap();
        assert_eq!(
            counter,
            Counter {
                asc: 0,
                desc: Some(5)
            }
        );
        assert_eq!(store.persisted_counter(&game()), Some(counter));

        let rows = service
            .query_no_update(&QueryRequest::new("fifa", 2))
            .await
            .unwrap();
        assert_eq!(ids(&rows), vec![1, 2]);
    }

    #[tokio::test]
    async fn shutdown_flushes_and_persists() {
        let (service, store) = service_with(100);
        service.create_game(&GameRequest { game_name: "fifa".into() }).await.unwrap();
        service.insert(Account::new("fifa", "a1")).await.unwrap();
        service.insert(Account::new("fifa", "a2")).await.unwrap();
        assert!(store.rows(&game()).unwrap().is_empty());

        service.shutdown().await;
        assert_eq!(store.rows(&game()).unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_task_runs_on_interval() {
        let (service, store) = service_with(100);
        service.insert(Account::new("fifa", "a1")).await.unwrap();

        let token = CancellationToken::new();
        let handle = service.spawn_flush_task(token.clone());
        tokio::time::sleep(service.config().flush_interval() + Duration::from_secs(1)).await;

        assert_eq!(store.rows(&game()).unwrap().len(), 1);
        token.cancel();
        handle.await.unwrap();
    }
}
