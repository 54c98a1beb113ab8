//! # Write Coordinator
//!
//! `Coordinator` wraps an [`AggregateEngine`], which does no I/O and only computes writes, and
//! a [`StorageBackend`], which is fully asynchronous and may refuse work at any time. It
//! accumulates writes into batches, flushes them according to the configured [`SyncLevel`],
//! and makes sure failed asynchronous flushes cannot be silently ignored.
//!
//! ## Write Path
//!
//! ```text
//!   write_nonblocking(op, target)
//!        │
//!        ├── error state set? ──────────────────────────► Err(AsyncFailure(cause))
//!        │
//!        ▼
//!   engine.compute_writes(target, op)
//!        │
//!        ├── FULL_SYNC ──────────────► batch of this op alone ──┐
//!        │                                                      │
//!        └── BATCH_SYNC / BATCH_ASYNC ► accumulator.merge()     │
//!                                         │         │           │
//!                                   no trigger   sealed ────────┤
//!                                         │                     ▼
//!                                         ▼          dispatcher.dispatch()  (retries while busy)
//!                                 NoFlushTriggered              │
//!                                                               ▼
//!                                                    monitor.watch() ──► Flushed(FlushHandle)
//! ```
//!
//! `write_blocking` runs the same path and then waits on the handle, if any. It is refused
//! under `BATCH_ASYNC`, where writers have opted out of observing flush results directly.
//!
//! ## Error Handling
//!
//! A failed flush reaches the writer two ways. The handle resolves with the failure, which a
//! blocking writer rethrows as an I/O error (for I/O causes and interruption) or an internal
//! error (anything else). Because a non-blocking writer may never look at its handle, the
//! watcher also records the failure in the permanent error state, after which every
//! non-blocking write and every explicit [`Coordinator::flush`] fails immediately with the
//! recorded cause. Buffered writes stay in memory rather than being pushed into a backend
//! known to be broken.
//!
//! ## Thread Safety
//!
//! The coordinator is `Send + Sync`. The accumulator lock is held only while merging and
//! deciding; dispatch, retries and waiting all happen outside it. The blocking entry points
//! park the calling thread and must not be called from inside an async runtime.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use log::{debug, info};

use crate::common::config::BatchId;
use crate::common::exception::{CubeIoError, CubeResult, FlushError};
use crate::common::time::{Clock, SystemClock};
use crate::cube::{Address, AddressBuilder, AggregateEngine, Batch};
use crate::io::accumulator::{BatchAccumulator, FlushTrigger};
use crate::io::config::{CoordinatorConfig, SyncLevel};
use crate::io::dispatcher::FlushDispatcher;
use crate::io::monitor::{AsyncErrorMonitor, FlushHandle, PermanentErrorState};
use crate::io::stats::{CoordinatorStats, StatsSnapshot};
use crate::storage::StorageBackend;

/// Result of a non-blocking write
#[derive(Debug)]
pub enum WriteOutcome {
    /// The write was merged into the in-progress batch
    NoFlushTriggered,
    /// The write caused a batch to be dispatched
    Flushed(FlushHandle),
}

impl WriteOutcome {
    pub fn is_flushed(&self) -> bool {
        matches!(self, WriteOutcome::Flushed(_))
    }

    pub fn into_handle(self) -> Option<FlushHandle> {
        match self {
            WriteOutcome::NoFlushTriggered => None,
            WriteOutcome::Flushed(handle) => Some(handle),
        }
    }
}

pub struct Coordinator<E: AggregateEngine> {
    engine: Arc<E>,
    backend: Arc<dyn StorageBackend<E::Op>>,
    accumulator: BatchAccumulator<E::Op>,
    dispatcher: FlushDispatcher<E::Op>,
    monitor: AsyncErrorMonitor,
    error_state: Arc<PermanentErrorState>,
    stats: Arc<CoordinatorStats>,
    sync_level: SyncLevel,
    next_batch_id: AtomicU64,
}

impl<E: AggregateEngine> Coordinator<E> {
    pub fn new(
        engine: Arc<E>,
        backend: Arc<dyn StorageBackend<E::Op>>,
        config: CoordinatorConfig,
    ) -> CubeResult<Self> {
        Self::with_clock(engine, backend, config, Arc::new(SystemClock))
    }

    /// Like [`Coordinator::new`], reading batch age from `clock`.
    pub fn with_clock(
        engine: Arc<E>,
        backend: Arc<dyn StorageBackend<E::Op>>,
        config: CoordinatorConfig,
        clock: Arc<dyn Clock>,
    ) -> CubeResult<Self> {
        config.validate()?;

        let error_state = Arc::new(PermanentErrorState::new());
        let stats = Arc::new(CoordinatorStats::new());
        let monitor = AsyncErrorMonitor::new(
            config.watcher_threads,
            Arc::clone(&error_state),
            Arc::clone(&stats),
        )?;
        let dispatcher = FlushDispatcher::new(
            Arc::clone(&backend),
            config.retry_interval(),
            Arc::clone(&stats),
        );
        let accumulator = BatchAccumulator::new(config.batch_size, config.max_batch_age(), clock);

        info!(
            "Write coordinator started: sync_level={}, batch_size={}, max_batch_age={:?}",
            config.sync_level,
            config.batch_size,
            config.max_batch_age()
        );

        Ok(Self {
            engine,
            backend,
            accumulator,
            dispatcher,
            monitor,
            error_state,
            stats,
            sync_level: config.sync_level,
            next_batch_id: AtomicU64::new(1),
        })
    }

    /// Applies `op` at `target`, possibly flushing to the backend depending on the sync level.
    ///
    /// Returns [`WriteOutcome::Flushed`] with the flush's handle when this write caused a batch
    /// to be dispatched. Fails immediately with [`CubeIoError::AsyncFailure`] once any earlier
    /// flush has failed.
    pub fn write_nonblocking(&self, op: E::Op, target: &E::Target) -> CubeResult<WriteOutcome> {
        if let Some(cause) = self.error_state.load() {
            self.stats.record_rejected_write();
            return Err(CubeIoError::AsyncFailure(cause));
        }

        let writes = self.engine.compute_writes(target, &op)?;
        self.stats.record_write();

        let sealed = match self.sync_level {
            // Every write is its own batch; nothing is shared between writers.
            SyncLevel::FullSync => Some((writes, FlushTrigger::Forced)),
            SyncLevel::BatchSync | SyncLevel::BatchAsync => self
                .accumulator
                .merge(writes)
                .map(|sealed| (sealed.batch, sealed.trigger)),
        };

        match sealed {
            Some((batch, trigger)) => Ok(WriteOutcome::Flushed(self.run_batch(batch, trigger))),
            None => Ok(WriteOutcome::NoFlushTriggered),
        }
    }

    /// Applies `op` at `target` and, if that triggers a flush, waits for the flush to finish.
    ///
    /// Not allowed under [`SyncLevel::BatchAsync`]. Note that success does not mean the write
    /// reached the backend unless the sync level is [`SyncLevel::FullSync`]; under
    /// [`SyncLevel::BatchSync`] it is usually only staged in the in-progress batch.
    ///
    /// Waits without a timeout: an unresponsive backend blocks the caller indefinitely.
    pub fn write_blocking(&self, op: E::Op, target: &E::Target) -> CubeResult<()> {
        if self.sync_level == SyncLevel::BatchAsync {
            return Err(CubeIoError::BlockingUnsupported(self.sync_level));
        }

        match self.write_nonblocking(op, target)? {
            WriteOutcome::Flushed(handle) => handle.wait().map_err(CubeIoError::from_flush_failure),
            WriteOutcome::NoFlushTriggered => Ok(()),
        }
    }

    /// Reads the stored value at `address`; `None` if nothing was ever written there.
    pub fn read(&self, address: &Address) -> CubeResult<Option<E::Op>> {
        self.engine.validate_read(address)?;
        Ok(self.backend.get(address)?)
    }

    pub fn read_with(&self, builder: &dyn AddressBuilder) -> CubeResult<Option<E::Op>> {
        let address = builder.build()?;
        self.read(&address)
    }

    /// Dispatches the in-progress batch, even if empty, and waits for the backend's
    /// durability barrier.
    ///
    /// Refused once the permanent error state is set; buffered writes are kept.
    pub fn flush(&self) -> CubeResult<()> {
        if let Some(cause) = self.error_state.load() {
            return Err(CubeIoError::AsyncFailure(cause));
        }

        let sealed = self.accumulator.take();
        let handle = self.run_batch(sealed.batch, sealed.trigger);
        self.backend.await_all_durable()?;
        handle.wait().map_err(CubeIoError::from_flush_failure)
    }

    fn run_batch(&self, batch: Batch<E::Op>, trigger: FlushTrigger) -> FlushHandle {
        let batch_id: BatchId = self.next_batch_id.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Flushing batch {} with {} writes ({:?})",
            batch_id,
            batch.len(),
            trigger
        );
        let pending = self.dispatcher.dispatch(Arc::new(batch));
        self.monitor.watch(batch_id, pending)
    }

    pub fn sync_level(&self) -> SyncLevel {
        self.sync_level
    }

    /// Number of distinct addresses waiting in the in-progress batch
    pub fn pending_len(&self) -> usize {
        self.accumulator.len()
    }

    /// Age of the oldest buffered write, or `None` when nothing is buffered
    pub fn pending_age(&self) -> Option<Duration> {
        self.accumulator.batch_age()
    }

    /// The failure that tripped the circuit breaker, if any
    pub fn async_error(&self) -> Option<Arc<FlushError>> {
        self.error_state.load()
    }

    pub fn is_errored(&self) -> bool {
        self.error_state.is_set()
    }

    /// Number of dispatched batches still waiting on the backend
    pub fn in_flight_flushes(&self) -> usize {
        self.monitor.in_flight()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}
