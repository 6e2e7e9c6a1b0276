use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use gamepool_core::{PoolError, Response};

use super::{Job, JobHandler};

pub(super) type SharedReceiver = Arc<Mutex<mpsc::Receiver<Job>>>;

async fn recv(rx: &SharedReceiver) -> Option<Job> {
    rx.lock().await.recv().await
}

fn try_recv(rx: &SharedReceiver) -> Option<Job> {
    rx.try_lock().ok().and_then(|mut rx| rx.try_recv().ok())
}

/// Worker task: runs jobs until `shutdown` is cancelled.
///
/// A job that is already waiting on the high queue always wins over the
/// normal queue. Shutdown is only observed between jobs, so a job that has
/// started always completes.
pub(super) async fn worker_loop(
    worker_id: usize,
    high: SharedReceiver,
    normal: SharedReceiver,
    handler: Arc<dyn JobHandler>,
    shutdown: CancellationToken,
) {
    tracing::trace!(worker_id, "worker started");

    loop {
        let job = match try_recv(&high) {
            Some(job) => job,
            None => {
                let next = tokio::select! {
                    biased;
                    () = shutdown.cancelled() => None,
                    job = recv(&high) => job,
                    job = recv(&normal) => job,
                };
                match next {
                    Some(job) => job,
                    None => break,
                }
            }
        };

        if shutdown.is_cancelled() {
            break;
        }
        run_job(worker_id, &*handler, job).await;
    }

    tracing::trace!(worker_id, "worker stopped");
}

async fn run_job(worker_id: usize, handler: &dyn JobHandler, job: Job) {
    let response = if job.cancel.is_cancelled() {
        tracing::debug!(worker_id, "skipping cancelled job");
        Response::from_error(&PoolError::Cancelled)
    } else {
        handler.handle(job.payload).await
    };

    if job.reply.send(response).is_err() {
        tracing::debug!(worker_id, "requester went away before the response");
    }
}
