//! Write coordination between callers and the storage backend.
//!
//! # Submodules
//!
//! - [`config`]: sync levels and coordinator tuning knobs.
//! - [`accumulator`]: the shared in-progress batch and its size/age thresholds.
//! - [`dispatcher`]: submission of sealed batches, retrying while the backend is busy.
//! - [`monitor`]: per-flush watcher tasks and the permanent error state.
//! - [`coordinator`]: the [`Coordinator`] write/read API tying the above together.
//! - [`stats`]: write path counters.

pub mod accumulator;
pub mod config;
pub mod coordinator;
pub mod dispatcher;
pub mod monitor;
pub mod stats;

pub use accumulator::{BatchAccumulator, FlushTrigger, SealedBatch};
pub use config::{CoordinatorConfig, SyncLevel};
pub use coordinator::{Coordinator, WriteOutcome};
pub use dispatcher::FlushDispatcher;
pub use monitor::{AsyncErrorMonitor, FlushHandle, PermanentErrorState};
pub use stats::{CoordinatorStats, StatsSnapshot};
