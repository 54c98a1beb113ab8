//! Backend contract consumed by the write coordinator.
//!
//! A backend accepts sealed batches without blocking. Acceptance hands back a
//! [`PendingFlush`] which resolves once the backend has written the batch, or
//! with the [`FlushError`] that stopped it. A backend that cannot take more
//! work right now refuses with [`BackendBusy`] and expects the batch again
//! later.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::common::exception::{BackendBusy, FlushError};
use crate::cube::{Address, Batch, Op};

pub trait StorageBackend<T: Op>: Send + Sync {
    /// Queues `batch` for writing. Must not block on the write itself.
    fn submit_batch(&self, batch: Arc<Batch<T>>) -> Result<PendingFlush, BackendBusy>;

    fn get(&self, address: &Address) -> io::Result<Option<T>>;

    /// Blocks until every batch accepted so far has been written.
    fn await_all_durable(&self) -> io::Result<()>;
}

type FlushResult = Result<(), FlushError>;

/// Completion token for one accepted batch, resolved by its [`FlushCompleter`].
///
/// If the completer is dropped without reporting, the flush resolves to
/// [`FlushError::Interrupted`].
#[derive(Debug)]
pub struct PendingFlush {
    rx: oneshot::Receiver<FlushResult>,
}

/// Backend-side half of a [`PendingFlush`].
#[derive(Debug)]
pub struct FlushCompleter {
    tx: oneshot::Sender<FlushResult>,
}

impl PendingFlush {
    pub fn channel() -> (FlushCompleter, PendingFlush) {
        let (tx, rx) = oneshot::channel();
        (FlushCompleter { tx }, PendingFlush { rx })
    }

    /// A flush that has already succeeded.
    pub fn completed() -> Self {
        let (completer, pending) = Self::channel();
        completer.succeed();
        pending
    }

    /// A flush that has already failed with `error`.
    pub fn failed(error: FlushError) -> Self {
        let (completer, pending) = Self::channel();
        completer.fail(error);
        pending
    }
}

impl Future for PendingFlush {
    type Output = FlushResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(FlushError::Interrupted)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl FlushCompleter {
    pub fn complete(self, result: FlushResult) {
        // The receiver may already be gone if its watcher runtime shut down.
        let _ = self.tx.send(result);
    }

    pub fn succeed(self) {
        self.complete(Ok(()))
    }

    pub fn fail(self, error: FlushError) {
        self.complete(Err(error))
    }
}
