use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use gamepool_core::PoolError;

use super::worker::{worker_loop, SharedReceiver};
use super::{Job, JobHandler, JobKind};

/// A fixed set of workers fed by a high-priority and a normal queue.
pub struct WorkerPool {
    high: mpsc::Sender<Job>,
    normal: mpsc::Sender<Job>,
    shutdown: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn `workers` tasks. Each queue holds at most `queue_size` jobs.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn start(handler: Arc<dyn JobHandler>, workers: usize, queue_size: usize) -> Self {
        let capacity = queue_size.max(1);
        let (high, high_rx) = mpsc::channel(capacity);
        let (normal, normal_rx) = mpsc::channel(capacity);
        let high_rx: SharedReceiver = Arc::new(tokio::sync::Mutex::new(high_rx));
        let normal_rx: SharedReceiver = Arc::new(tokio::sync::Mutex::new(normal_rx));
        let shutdown = CancellationToken::new();

        let handles = (0..workers.max(1))
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    Arc::clone(&high_rx),
                    Arc::clone(&normal_rx),
                    Arc::clone(&handler),
                    shutdown.clone(),
                ))
            })
            .collect::<Vec<_>>();

        tracing::info!(workers = handles.len(), queue_size = capacity, "worker pool started");

        Self {
            high,
            normal,
            shutdown,
            workers: Mutex::new(handles),
        }
    }

    /// Queue a job, waiting for room when the queue it lands on is full.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::ShuttingDown` once [`Self::stop`] has been called.
    pub async fn submit(&self, job: Job) -> Result<(), PoolError> {
        if self.shutdown.is_cancelled() {
            return Err(PoolError::ShuttingDown);
        }

        let job = match job.kind {
            JobKind::Query => match self.high.try_send(job) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(job)) => job,
                Err(TrySendError::Closed(_)) => return Err(PoolError::ShuttingDown),
            },
            JobKind::Normal => job,
        };

        tokio::select! {
            () = self.shutdown.cancelled() => Err(PoolError::ShuttingDown),
            sent = self.normal.send(job) => sent.map_err(|_| PoolError::ShuttingDown),
        }
    }

    /// Whether [`Self::stop`] has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Signal shutdown and wait for every worker to finish its current job.
    ///
    /// Jobs still queued are dropped; their requesters see the reply channel
    /// close.
    pub async fn stop(&self) {
        self.shutdown.cancel();
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        tracing::debug!(workers = handles.len(), "waiting for workers");

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "worker panicked");
            }
        }
        tracing::info!("worker pool stopped");
    }
}
