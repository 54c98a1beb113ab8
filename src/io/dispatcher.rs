//! Hands sealed batches to the backend, retrying while it reports busy.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::debug;

use crate::common::exception::BackendBusy;
use crate::cube::{Batch, Op};
use crate::io::stats::CoordinatorStats;
use crate::storage::{PendingFlush, StorageBackend};

pub struct FlushDispatcher<T: Op> {
    backend: Arc<dyn StorageBackend<T>>,
    retry_interval: Duration,
    stats: Arc<CoordinatorStats>,
}

impl<T: Op> FlushDispatcher<T> {
    pub fn new(
        backend: Arc<dyn StorageBackend<T>>,
        retry_interval: Duration,
        stats: Arc<CoordinatorStats>,
    ) -> Self {
        Self {
            backend,
            retry_interval,
            stats,
        }
    }

    /// Submits `batch`, sleeping `retry_interval` between attempts while the backend is busy.
    ///
    /// Blocks the calling thread only for retry delays, never for the write itself.
    ///
    /// There is no retry ceiling: a backend that stays busy stalls this caller forever.
    /// Other callers keep dispatching newer batches meanwhile, so once retries happen
    /// the backend may accept batches out of submission order.
    pub fn dispatch(&self, batch: Arc<Batch<T>>) -> PendingFlush {
        loop {
            match self.backend.submit_batch(Arc::clone(&batch)) {
                Ok(pending) => {
                    self.stats.record_dispatch(batch.len());
                    return pending;
                }
                Err(BackendBusy) => {
                    debug!(
                        "Backend queue is full, retrying batch of {} writes in {:?}",
                        batch.len(),
                        self.retry_interval
                    );
                    self.stats.record_busy_retry();
                    thread::sleep(self.retry_interval);
                }
            }
        }
    }
}
