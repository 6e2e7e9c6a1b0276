//! Asynchronous cooldown timestamp updates.
//!
//! A gated query picks its rows first and stamps them afterwards: the stamp
//! is queued here and applied by a small worker pool as one batched update
//! per job. Until the update lands, an identical query may return the same
//! rows again.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use gamepool_core::{CooldownChannel, GameName, PoolError};
use gamepool_store::Store;

/// One batched channel update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CooldownJob {
    /// Game table to update.
    pub game: GameName,
    /// Row ids to stamp.
    pub ids: Vec<i64>,
    /// Channel column to set.
    pub channel: CooldownChannel,
    /// Timestamp to write.
    pub at: DateTime<Utc>,
}

/// Bounded queue of [`CooldownJob`]s with a fixed set of workers.
pub struct CooldownQueue {
    sender: RwLock<Option<mpsc::Sender<CooldownJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl CooldownQueue {
    /// Start `workers` tasks draining a queue of `capacity` jobs.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn start(store: Arc<dyn Store>, workers: usize, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let handles = (0..workers.max(1))
            .map(|worker_id| {
                let rx = Arc::clone(&rx);
                let store = Arc::clone(&store);
                tokio::spawn(worker_loop(worker_id, rx, store))
            })
            .collect();

        Self {
            sender: RwLock::new(Some(tx)),
            workers: Mutex::new(handles),
        }
    }

    fn sender(&self) -> Result<mpsc::Sender<CooldownJob>, PoolError> {
        self.sender.read().clone().ok_or(PoolError::ShuttingDown)
    }

    /// Queue a job, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::ShuttingDown` once [`Self::shutdown`] has started.
    pub async fn enqueue(&self, job: CooldownJob) -> Result<(), PoolError> {
        self.sender()?
            .send(job)
            .await
            .map_err(|_| PoolError::ShuttingDown)
    }

    /// Stop accepting jobs, let the workers drain what is queued, and wait
    /// for them to exit.
    pub async fn shutdown(&self) {
        drop(self.sender.write().take());
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "cooldown worker panicked");
            }
        }
        tracing::info!("cooldown queue drained");
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<CooldownJob>>>,
    store: Arc<dyn Store>,
) {
    tracing::trace!(worker_id, "cooldown worker started");
    loop {
        let job = { rx.lock().await.recv().await };
        let Some(job) = job else { break };

        match store
            .set_channel_time(&job.game, &job.ids, job.channel, job.at)
            .await
        {
            Ok(rows) => {
                tracing::debug!(game = %job.game, channel = %job.channel, rows, "cooldown applied");
            }
            Err(e) => {
                tracing::error!(
                    game = %job.game,
                    channel = %job.channel,
                    error = %e,
                    "cooldown update failed"
                );
            }
        }
    }
    tracing::trace!(worker_id, "cooldown worker stopped");
}
