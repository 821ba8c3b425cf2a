//! # Single-Flight Operation Queue
//!
//! The serialization point for every mutating remote operation. Callers
//! submit `(operation, label)` pairs; one consumer task executes them
//! strictly one at a time in FIFO order and hands each result back through
//! a oneshot. Cleanup, manual checks and every transfer pipeline all go
//! through here, so the provider never sees two mutating calls from this
//! process concurrently.
//!
//! An operation that fails simply resolves its caller's future with the
//! error; the consumer loop itself never stops until every queue handle is
//! dropped.

use crate::error::{Result, TransferError};
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

struct QueuedOp {
    label: String,
    run: BoxFuture<'static, ()>,
}

/// Cloneable handle to the queue. The consumer task exits once every
/// handle is dropped and the backlog is drained.
#[derive(Clone)]
pub struct SingleFlightQueue {
    tx: mpsc::UnboundedSender<QueuedOp>,
    depth: Arc<AtomicUsize>,
}

impl SingleFlightQueue {
    /// Create the queue and spawn its consumer task.
    pub fn start() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<QueuedOp>();
        let depth = Arc::new(AtomicUsize::new(0));

        let consumer_depth = Arc::clone(&depth);
        tokio::spawn(async move {
            while let Some(op) = rx.recv().await {
                debug!(label = %op.label, "executing queued operation");
                op.run.await;
                consumer_depth.fetch_sub(1, Ordering::SeqCst);
            }
        });

        Self { tx, depth }
    }

    /// Submit an operation and wait for its result.
    ///
    /// Operations run in submission order, one at a time. The returned
    /// error is [`TransferError::QueueClosed`] only when the consumer is
    /// gone; operation-level failures come back as the future's own output.
    pub async fn submit<T, F>(&self, label: impl Into<String>, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();
        let wrapped = Box::pin(async move {
            let output = op.await;
            // receiver may have given up; nothing to do then
            let _ = result_tx.send(output);
        });

        self.depth.fetch_add(1, Ordering::SeqCst);
        self.tx
            .send(QueuedOp {
                label: label.into(),
                run: wrapped,
            })
            .map_err(|_| {
                self.depth.fetch_sub(1, Ordering::SeqCst);
                TransferError::QueueClosed
            })?;

        result_rx.await.map_err(|_| TransferError::QueueClosed)
    }

    /// True while an operation is executing or queued. Scheduled capacity
    /// checks use this to skip themselves instead of delaying transfers.
    pub fn is_busy(&self) -> bool {
        self.depth.load(Ordering::SeqCst) > 0
    }
}
