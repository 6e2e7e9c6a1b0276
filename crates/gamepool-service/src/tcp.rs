//! Binary protocol listener.
//!
//! Each connection gets a reader task that cuts frames out of the byte stream
//! and submits them to the [`WorkerPool`], and a writer task that sends the
//! responses back in request order. A frame with an impossible length closes
//! the connection; requests already in flight are still answered.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use gamepool_core::{FrameBuffer, PoolError, Response};

use crate::pool::{Job, WorkerPool};

/// Responses a connection may have outstanding before its reader stops
/// reading.
const PIPELINE_DEPTH: usize = 100;

const READ_CHUNK: usize = 8 * 1024;

/// Accept connections until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns an error only if reading the listener's local address fails;
/// accept errors are logged and the loop continues.
pub async fn serve(
    listener: TcpListener,
    pool: Arc<WorkerPool>,
    max_frame_bytes: usize,
    shutdown: CancellationToken,
) -> io::Result<()> {
    let local = listener.local_addr()?;
    tracing::info!(addr = %local, "tcp listener started");

    loop {
        let (stream, peer) = tokio::select! {
            () = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    continue;
                }
            },
        };

        let pool = Arc::clone(&pool);
        let token = shutdown.child_token();
        tokio::spawn(handle_connection(stream, peer, pool, max_frame_bytes, token));
    }

    tracing::info!(addr = %local, "tcp listener stopped");
    Ok(())
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    pool: Arc<WorkerPool>,
    max_frame_bytes: usize,
    token: CancellationToken,
) {
    let conn_id = Uuid::new_v4();
    tracing::debug!(%conn_id, %peer, "connection opened");

    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(%conn_id, error = %e, "set_nodelay failed");
    }
    let (mut reader, writer) = stream.into_split();
    let (replies, pending) = mpsc::channel(PIPELINE_DEPTH);
    let writer_task = tokio::spawn(write_responses(conn_id, writer, pending, token.clone()));

    let mut buffer = FrameBuffer::with_max_frame(max_frame_bytes);
    let mut chunk = vec![0_u8; READ_CHUNK];

    'read: loop {
        let read = tokio::select! {
            () = token.cancelled() => break,
            read = reader.read(&mut chunk) => read,
        };
        let n = match read {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "read failed");
                break;
            }
        };
        buffer.feed(&chunk[..n]);

        loop {
            let payload = match buffer.next_frame() {
                Ok(Some(payload)) => payload,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(%conn_id, %peer, error = %e, "bad frame, closing connection");
                    break 'read;
                }
            };

            let (job, reply) = Job::new(payload, token.clone());
            let reply = match pool.submit(job).await {
                Ok(()) => reply,
                Err(e) => answered(&e),
            };
            if replies.send(reply).await.is_err() {
                break 'read;
            }
        }
    }

    drop(replies);
    if let Err(e) = writer_task.await {
        tracing::error!(%conn_id, error = %e, "writer task panicked");
    }
    tracing::debug!(%conn_id, %peer, "connection closed");
}

/// A reply slot that already holds an error.
fn answered(err: &PoolError) -> oneshot::Receiver<Response> {
    let (tx, rx) = oneshot::channel();
    let _ = tx.send(Response::from_error(err));
    rx
}

async fn write_responses(
    conn_id: Uuid,
    mut writer: OwnedWriteHalf,
    mut pending: mpsc::Receiver<oneshot::Receiver<Response>>,
    token: CancellationToken,
) {
    while let Some(reply) = pending.recv().await {
        // A dropped sender means the job was abandoned at shutdown.
        let response = reply
            .await
            .unwrap_or_else(|_| Response::from_error(&PoolError::ShuttingDown));

        let frame = match response.encode() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(%conn_id, error = %e, "response encoding failed");
                match Response::from_error(&e).encode() {
                    Ok(frame) => frame,
                    Err(_) => continue,
                }
            }
        };

        if let Err(e) = writer.write_all(&frame).await {
            tracing::debug!(%conn_id, error = %e, "write failed");
            token.cancel();
            return;
        }
    }

    let _ = writer.shutdown().await;
}
