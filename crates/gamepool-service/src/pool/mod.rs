//! Priority worker pool for protocol requests.
//!
//! Query jobs go to a small high-priority queue so that reads are not stuck
//! behind bursts of inserts; everything else (and queries that overflow the
//! high queue) goes to the normal queue. A fixed set of workers drains both.

mod manager;
mod worker;

pub use manager::WorkerPool;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use gamepool_core::{Command, Response};

/// Which queue a job is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// Read requests, tried on the high-priority queue first.
    Query,
    /// Everything else.
    Normal,
}

impl JobKind {
    /// Classify a raw request payload by its command byte.
    ///
    /// Unknown or missing commands are `Normal`; the handler rejects them.
    #[must_use]
    pub fn of_payload(payload: &[u8]) -> Self {
        match payload.first().map(|b| Command::try_from(*b)) {
            Some(Ok(command)) if command.is_query() => Self::Query,
            _ => Self::Normal,
        }
    }
}

/// A unit of work submitted to the pool.
#[derive(Debug)]
pub struct Job {
    /// Checked before the handler runs; a cancelled job is answered with
    /// an error and never executed.
    pub cancel: CancellationToken,
    /// Request payload (command byte and JSON body).
    pub payload: Bytes,
    /// Queue routing.
    pub kind: JobKind,
    /// Where the response goes.
    pub reply: oneshot::Sender<Response>,
}

impl Job {
    /// Build a job, classifying it from its payload. Returns the job and the
    /// receiver its response will arrive on.
    #[must_use]
    pub fn new(payload: Bytes, cancel: CancellationToken) -> (Self, oneshot::Receiver<Response>) {
        let (reply, rx) = oneshot::channel();
        let job = Self {
            cancel,
            kind: JobKind::of_payload(&payload),
            payload,
            reply,
        };
        (job, rx)
    }
}

/// Executes request payloads.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    /// Handle one request payload and produce its response.
    async fn handle(&self, payload: Bytes) -> Response;
}
