//! Cursor consumption engine.
//!
//! Each (game, direction) pair has a position and a look-ahead window of rows
//! fetched beyond that position but not yet served. Consumers take rows off
//! the window's consuming end (front ascending, back descending); the window
//! is replenished from the store a page at a time. Positions live in memory
//! and are written back whenever they cross a multiple of the persist step,
//! so a crash can re-serve at most one step's worth of rows.

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;

use gamepool_core::{crosses_multiple, Account, Counter, Direction, GameName, PoolError};
use gamepool_store::Store;

use crate::locks::{counter_key, LockRegistry};

#[derive(Debug)]
struct CursorState {
    /// Ascending: id of the last row served. Descending: highest unserved id.
    position: i64,
    /// Rows fetched but not served, ascending by id.
    window: VecDeque<Account>,
    /// Ascending: highest id fetched. Descending: highest id not yet fetched.
    boundary: i64,
}

impl CursorState {
    fn at(position: i64) -> Self {
        Self {
            position,
            window: VecDeque::new(),
            boundary: position,
        }
    }
}

type CursorKey = (GameName, Direction);

/// Serves rows sequentially without repeats.
pub struct CursorEngine {
    store: Arc<dyn Store>,
    locks: Arc<LockRegistry>,
    states: DashMap<CursorKey, CursorState>,
    page_size: usize,
    persist_every: i64,
}

impl CursorEngine {
    /// Create an engine fetching `page_size` rows per replenishment and
    /// persisting positions every `persist_every` steps.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        locks: Arc<LockRegistry>,
        page_size: usize,
        persist_every: i64,
    ) -> Self {
        Self {
            store,
            locks,
            states: DashMap::new(),
            page_size: page_size.max(1),
            persist_every: persist_every.max(1),
        }
    }

    /// Serve the next `count` rows of `game` in `direction`.
    ///
    /// A `count` of zero is treated as one. Either exactly `count` rows are
    /// returned or nothing is consumed.
    ///
    /// # Errors
    ///
    /// - `PoolError::Exhausted` if fewer than `count` rows remain.
    /// - `PoolError::Store` if loading the counter or fetching rows fails.
    pub async fn consume(
        &self,
        game: &GameName,
        direction: Direction,
        count: usize,
    ) -> Result<Vec<Account>, PoolError> {
        let count = count.max(1);
        let _guard = self.locks.acquire(&counter_key(game, direction)).await;

        let key = (game.clone(), direction);
        let mut state = match self.states.remove(&key) {
            Some((_, state)) => state,
            None => self.load_state(game, direction).await?,
        };

        let old = state.position;
        let result = match direction {
            Direction::Asc => self.take_asc(game, &mut state, count).await,
            Direction::Desc => self.take_desc(game, &mut state, count).await,
        };
        let new = state.position;
        self.states.insert(key, state);

        let rows = result?;
        if crosses_multiple(old, new, self.persist_every) {
            self.persist(game, direction, new).await;
        }

        tracing::debug!(
            game = %game,
            direction = %direction,
            count = rows.len(),
            position = new,
            "cursor consumed"
        );
        Ok(rows)
    }

    /// Reset both directions: ascending to 0, descending to `desc` or the
    /// current row count. Windows are discarded and positions persisted.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Store` if the row count or persistence fails.
    pub async fn reset(&self, game: &GameName, desc: Option<i64>) -> Result<Counter, PoolError> {
        {
            let _guard = self.locks.acquire(&counter_key(game, Direction::Asc)).await;
            self.store.save_counter(game, Direction::Asc, 0).await?;
            self.states
                .insert((game.clone(), Direction::Asc), CursorState::at(0));
        }

        let desc = {
            let _guard = self
                .locks
                .acquire(&counter_key(game, Direction::Desc))
                .await;
            let desc = match desc {
                Some(desc) => desc,
                None => self.store.count_rows(game).await?,
            };
            self.store.save_counter(game, Direction::Desc, desc).await?;
            self.states
                .insert((game.clone(), Direction::Desc), CursorState::at(desc));
            desc
        };

        tracing::info!(game = %game, desc, "cursor counters reset");
        Ok(Counter {
            asc: 0,
            desc: Some(desc),
        })
    }

    /// Write every in-memory position back to the store.
    pub async fn persist_all(&self) {
        let keys: Vec<CursorKey> = self.states.iter().map(|e| e.key().clone()).collect();
        for (game, direction) in keys {
            let _guard = self.locks.acquire(&counter_key(&game, direction)).await;
            let position = self.states.get(&(game.clone(), direction)).map(|s| s.position);
            if let Some(position) = position {
                self.persist(&game, direction, position).await;
            }
        }
    }

    /// Current in-memory position, if the cursor has been used.
    #[must_use]
    pub fn position(&self, game: &GameName, direction: Direction) -> Option<i64> {
        self.states
            .get(&(game.clone(), direction))
            .map(|s| s.position)
    }

    async fn load_state(
        &self,
        game: &GameName,
        direction: Direction,
    ) -> Result<CursorState, PoolError> {
        let counter = self.store.load_counter(game).await?;
        let position = match counter.position(direction) {
            Some(position) => position,
            None => {
                let rows = self.store.count_rows(game).await?;
                self.store.save_counter(game, direction, rows).await?;
                tracing::debug!(game = %game, rows, "descending counter initialised");
                rows
            }
        };
        Ok(CursorState::at(position))
    }

    async fn take_asc(
        &self,
        game: &GameName,
        state: &mut CursorState,
        count: usize,
    ) -> Result<Vec<Account>, PoolError> {
        if state.window.len() < count {
            let rows = self
                .store
                .fetch_after(game, state.boundary, self.page_size.max(count))
                .await?;
            if let Some(last) = rows.last() {
                state.boundary = last.id;
            }
            state.window.extend(rows);
            if state.window.len() < count {
                return Err(PoolError::Exhausted);
            }
        }

        let served: Vec<Account> = state.window.drain(..count).collect();
        if let Some(last) = served.last() {
            state.position = last.id;
        }
        Ok(served)
    }

    async fn take_desc(
        &self,
        game: &GameName,
        state: &mut CursorState,
        count: usize,
    ) -> Result<Vec<Account>, PoolError> {
        let wanted = i64::try_from(count).unwrap_or(i64::MAX);
        if state.position - wanted <= 0 {
            return Err(PoolError::Exhausted);
        }

        if state.window.len() < count {
            let rows = self
                .store
                .fetch_before(game, state.boundary, self.page_size.max(count))
                .await?;
            if let Some(first) = rows.first() {
                state.boundary = first.id - 1;
            }
            for row in rows.into_iter().rev() {
                state.window.push_front(row);
            }
            if state.window.len() < count {
                return Err(PoolError::Exhausted);
            }
        }

        let served: Vec<Account> = state.window.split_off(state.window.len() - count).into();
        if let Some(first) = served.first() {
            state.position = first.id - 1;
        }
        Ok(served)
    }

    async fn persist(&self, game: &GameName, direction: Direction, position: i64) {
        if let Err(e) = self.store.save_counter(game, direction, position).await {
            tracing::error!(
                game = %game,
                direction = %direction,
                position,
                error = %e,
                "failed to persist cursor counter"
            );
        }
    }
}
