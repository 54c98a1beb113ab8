//! # Asynchronous Flush Monitoring
//!
//! Every dispatched batch gets one watcher task on a dedicated tokio runtime. The watcher
//! awaits the backend's [`PendingFlush`]; on failure it records the cause in the shared
//! [`PermanentErrorState`], which stops all further non-blocking writes, then forwards the
//! outcome to the [`FlushHandle`] returned to the writer.
//!
//! ```text
//!   writer thread                  watcher runtime                 backend
//!   ═══════════════════════════════════════════════════════════════════════════
//!      │ watch(pending)                 │                              │
//!      │───────────── spawn ───────────►│ pending.await ◄──────────────│ complete / fail
//!      │◄── FlushHandle                 │                              │
//!      │                                │ Err(cause)?                  │
//!      │                                │   error_state.store(cause)   │
//!      │ handle.wait() ◄──── result ────│                              │
//! ```
//!
//! Watchers never block each other and there is no cap on how many run at once. A pending
//! flush that is dropped by the backend without a result counts as a failure
//! ([`FlushError::Interrupted`]), exactly like an explicit error.
//!
//! The error state keeps the most recent failure: concurrent failures overwrite each other
//! and the last store wins. Once any failure is stored the state never clears.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll};

use log::{error, warn};
use parking_lot::RwLock;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use crate::common::config::{BatchId, WATCHER_THREAD_NAME};
use crate::common::exception::{CubeIoError, CubeResult, FlushError};
use crate::io::stats::CoordinatorStats;
use crate::storage::PendingFlush;

type HandleResult = Result<(), Arc<FlushError>>;

/// Circuit breaker shared by writers and watchers.
#[derive(Debug, Default)]
pub struct PermanentErrorState {
    tripped: AtomicBool,
    cause: RwLock<Option<Arc<FlushError>>>,
}

impl PermanentErrorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded failure, if the breaker has tripped.
    pub fn load(&self) -> Option<Arc<FlushError>> {
        if !self.tripped.load(Ordering::Acquire) {
            return None;
        }
        self.cause.read().clone()
    }

    /// Records `cause`, replacing any earlier one. Returns the replaced cause.
    pub fn store(&self, cause: Arc<FlushError>) -> Option<Arc<FlushError>> {
        let previous = self.cause.write().replace(cause);
        self.tripped.store(true, Ordering::Release);
        previous
    }

    pub fn is_set(&self) -> bool {
        self.tripped.load(Ordering::Acquire)
    }
}

/// Completion token for one dispatched batch.
///
/// Resolves once the backend finishes the batch. Use [`FlushHandle::wait`] from a plain
/// thread, or `.await` it from async code.
#[derive(Debug)]
pub struct FlushHandle {
    batch_id: BatchId,
    rx: oneshot::Receiver<HandleResult>,
}

impl FlushHandle {
    pub fn batch_id(&self) -> BatchId {
        self.batch_id
    }

    /// Blocks the current thread until the flush completes.
    ///
    /// # Panics
    ///
    /// Panics when called from within an async execution context.
    pub fn wait(self) -> HandleResult {
        self.rx
            .blocking_recv()
            .unwrap_or_else(|_| Err(Arc::new(FlushError::Interrupted)))
    }

    /// The outcome if the flush has already completed.
    pub fn try_result(&mut self) -> Option<HandleResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(Arc::new(FlushError::Interrupted))),
        }
    }
}

impl Future for FlushHandle {
    type Output = HandleResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(Arc::new(FlushError::Interrupted))),
            Poll::Pending => Poll::Pending,
        }
    }
}

pub struct AsyncErrorMonitor {
    runtime: Option<Runtime>,
    handle: Handle,
    error_state: Arc<PermanentErrorState>,
    stats: Arc<CoordinatorStats>,
    in_flight: Arc<AtomicUsize>,
}

impl AsyncErrorMonitor {
    pub fn new(
        worker_threads: usize,
        error_state: Arc<PermanentErrorState>,
        stats: Arc<CoordinatorStats>,
    ) -> CubeResult<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(worker_threads)
            .thread_name(WATCHER_THREAD_NAME)
            .build()
            .map_err(|e| CubeIoError::Runtime(e.to_string()))?;
        let handle = runtime.handle().clone();

        Ok(Self {
            runtime: Some(runtime),
            handle,
            error_state,
            stats,
            in_flight: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Spawns a watcher for `pending` and returns the writer-facing handle.
    pub fn watch(&self, batch_id: BatchId, pending: PendingFlush) -> FlushHandle {
        let (tx, rx) = oneshot::channel();
        let error_state = Arc::clone(&self.error_state);
        let stats = Arc::clone(&self.stats);
        let in_flight = Arc::clone(&self.in_flight);

        in_flight.fetch_add(1, Ordering::SeqCst);
        self.handle.spawn(async move {
            let result = match pending.await {
                Ok(()) => {
                    stats.record_flush_completed();
                    Ok(())
                }
                Err(e) => {
                    let cause = Arc::new(e);
                    stats.record_flush_failed();
                    error!(
                        "Putting write coordinator into an error state, batch {} failed: {}",
                        batch_id, cause
                    );
                    if let Some(previous) = error_state.store(Arc::clone(&cause)) {
                        warn!("Replaced earlier flush failure: {}", previous);
                    }
                    Err(cause)
                }
            };
            in_flight.fetch_sub(1, Ordering::SeqCst);
            // The writer may have dropped its handle; the error state already has the outcome.
            let _ = tx.send(result);
        });

        FlushHandle { batch_id, rx }
    }

    /// Number of watchers still waiting on the backend
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn error_state(&self) -> &Arc<PermanentErrorState> {
        &self.error_state
    }
}

impl Drop for AsyncErrorMonitor {
    fn drop(&mut self) {
        // Outstanding watchers are abandoned; their handles resolve as interrupted.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
