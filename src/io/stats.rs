use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the write path, updated lock-free by writers and watchers
#[derive(Debug, Default)]
pub struct CoordinatorStats {
    writes: AtomicU64,
    rejected_writes: AtomicU64,
    batches_dispatched: AtomicU64,
    writes_dispatched: AtomicU64,
    busy_retries: AtomicU64,
    completed_flushes: AtomicU64,
    failed_flushes: AtomicU64,
}

/// Point-in-time copy of [`CoordinatorStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub writes: u64,
    pub rejected_writes: u64,
    pub batches_dispatched: u64,
    pub writes_dispatched: u64,
    pub busy_retries: u64,
    pub completed_flushes: u64,
    pub failed_flushes: u64,
}

impl CoordinatorStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected_write(&self) {
        self.rejected_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch(&self, batch_len: usize) {
        self.batches_dispatched.fetch_add(1, Ordering::Relaxed);
        self.writes_dispatched
            .fetch_add(batch_len as u64, Ordering::Relaxed);
    }

    pub fn record_busy_retry(&self) {
        self.busy_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush_completed(&self) {
        self.completed_flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush_failed(&self) {
        self.failed_flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            writes: self.writes.load(Ordering::Relaxed),
            rejected_writes: self.rejected_writes.load(Ordering::Relaxed),
            batches_dispatched: self.batches_dispatched.load(Ordering::Relaxed),
            writes_dispatched: self.writes_dispatched.load(Ordering::Relaxed),
            busy_retries: self.busy_retries.load(Ordering::Relaxed),
            completed_flushes: self.completed_flushes.load(Ordering::Relaxed),
            failed_flushes: self.failed_flushes.load(Ordering::Relaxed),
        }
    }
}
