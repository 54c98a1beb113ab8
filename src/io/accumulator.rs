//! # Batch Accumulator
//!
//! `BatchAccumulator` owns the in-progress batch shared by all writers and decides, under a
//! single mutex, when that batch must be sealed and handed off for flushing.
//!
//! ## Dual-Trigger Strategy
//!
//! ```text
//!   merge(writes)
//!        │
//!        ▼
//!   ┌─────────────────────────────────┐
//!   │ batch empty before this merge?  │── Yes ──► started_at = now
//!   └───────────────┬─────────────────┘
//!                   ▼
//!            batch.put_all(writes)
//!                   │
//!                   ▼
//!   ┌─────────────────────────────────┐
//!   │ batch.len() >= batch_size?      │── Yes ──► SizeThreshold
//!   └───────────────┬─────────────────┘
//!                   │ No
//!                   ▼
//!   ┌─────────────────────────────────┐
//!   │ now - started_at > max_age?     │── Yes ──► AgeThreshold
//!   └───────────────┬─────────────────┘
//!                   │ No
//!                   ▼
//!              keep buffering
//! ```
//!
//! On either trigger the whole batch is swapped for an empty one and returned as a
//! [`SealedBatch`]. The lock is released before the caller dispatches it, so new writes land
//! in the next batch while the sealed one is still being flushed.
//!
//! ## Age Is Checked Lazily
//!
//! There is no background timer. The age limit is evaluated only when a write arrives, after
//! that write has been merged, so a batch can sit past `max_batch_age` until the next write
//! and that write is flushed together with it.

use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::common::time::Clock;
use crate::cube::{Batch, Op};

/// Why a batch was sealed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// The batch reached `batch_size` distinct addresses
    SizeThreshold,
    /// The oldest write in the batch outlived `max_batch_age`
    AgeThreshold,
    /// Explicit flush request
    Forced,
}

/// A batch removed from the accumulator, ready to dispatch
#[derive(Debug)]
pub struct SealedBatch<T> {
    pub batch: Batch<T>,
    pub trigger: FlushTrigger,
}

#[derive(Debug)]
struct InProgress<T> {
    batch: Batch<T>,
    started_at: Instant,
}

pub struct BatchAccumulator<T> {
    state: Mutex<InProgress<T>>,
    batch_size: usize,
    max_batch_age: Duration,
    clock: Arc<dyn Clock>,
}

impl<T: Op> BatchAccumulator<T> {
    pub fn new(batch_size: usize, max_batch_age: Duration, clock: Arc<dyn Clock>) -> Self {
        let started_at = clock.now();
        Self {
            state: Mutex::new(InProgress {
                batch: Batch::new(),
                started_at,
            }),
            batch_size,
            max_batch_age,
            clock,
        }
    }

    /// Merges `writes` into the in-progress batch and seals it if a threshold is crossed.
    pub fn merge(&self, writes: Batch<T>) -> Option<SealedBatch<T>> {
        let mut state = self.state.lock();
        let now = self.clock.now();

        if state.batch.is_empty() {
            state.started_at = now;
        }
        state.batch.put_all(writes);

        let trigger = if state.batch.len() >= self.batch_size {
            FlushTrigger::SizeThreshold
        } else if now.saturating_duration_since(state.started_at) > self.max_batch_age {
            FlushTrigger::AgeThreshold
        } else {
            return None;
        };

        Some(SealedBatch {
            batch: mem::take(&mut state.batch),
            trigger,
        })
    }

    /// Seals the in-progress batch unconditionally, even when it is empty.
    pub fn take(&self) -> SealedBatch<T> {
        let mut state = self.state.lock();
        SealedBatch {
            batch: mem::take(&mut state.batch),
            trigger: FlushTrigger::Forced,
        }
    }

    /// Number of distinct addresses waiting in the in-progress batch
    pub fn len(&self) -> usize {
        self.state.lock().batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().batch.is_empty()
    }

    /// Age of the oldest buffered write, or `None` when nothing is buffered
    pub fn batch_age(&self) -> Option<Duration> {
        let state = self.state.lock();
        if state.batch.is_empty() {
            return None;
        }
        Some(self.clock.now().saturating_duration_since(state.started_at))
    }
}
