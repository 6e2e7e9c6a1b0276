//! Per-key async mutexes.
//!
//! Each key gets its own mutex on first use; entries are never removed.
//! Operations that conflict on a game take the same key, unrelated games never
//! contend.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use gamepool_core::{Direction, GameName};

/// Lock key for a game's table operations.
#[must_use]
pub fn table_key(game: &GameName) -> String {
    game.to_string()
}

/// Lock key for a game's insert buffer.
#[must_use]
pub fn insert_buffer_key(game: &GameName) -> String {
    format!("{game}_insertbuffer")
}

/// Lock key for one cursor direction of a game.
#[must_use]
pub fn counter_key(game: &GameName, direction: Direction) -> String {
    format!("{game}_counter_{direction}")
}

/// Registry of named mutexes.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl LockRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive ownership of `key`.
    ///
    /// The guard releases the lock when dropped.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Number of keys ever locked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no key has been locked yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn key_shapes() {
        let game = GameName::new("fifa").unwrap();
        assert_eq!(table_key(&game), "fifa");
        assert_eq!(insert_buffer_key(&game), "fifa_insertbuffer");
        assert_eq!(counter_key(&game, Direction::Asc), "fifa_counter_asc");
        assert_eq!(counter_key(&game, Direction::Desc), "fifa_counter_desc");
    }

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let registry = Arc::new(LockRegistry::new());
        let guard = registry.acquire("fifa").await;

        let contender = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                let _guard = registry.acquire("fifa").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn different_keys_do_not_contend() {
        let registry = LockRegistry::new();
        let _a = registry.acquire("fifa").await;
        let _b = tokio::time::timeout(Duration::from_secs(1), registry.acquire("dota"))
            .await
            .unwrap();
        assert_eq!(registry.len(), 2);
    }
}
