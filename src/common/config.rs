use std::time::Duration;

/** Default number of distinct addresses in a batch before it is flushed. */
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/** Default age of the oldest write in a batch before the next write flushes it. */
pub const DEFAULT_MAX_BATCH_AGE: Duration = Duration::from_secs(10);

/** Delay between resubmissions of a batch the backend refused as busy. */
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/** Worker threads backing the flush watcher runtime. */
pub const DEFAULT_WATCHER_THREADS: usize = 1;

/** Thread name used by the flush watcher runtime. */
pub const WATCHER_THREAD_NAME: &str = "cubeio-flush-watcher";

/** Submission queue depth of the in-memory reference backend. */
pub const MEMORY_BACKEND_QUEUE_DEPTH: usize = 16;

pub type BatchId = u64; // sequence number assigned to a dispatched batch
