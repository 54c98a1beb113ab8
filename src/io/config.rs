//! Configuration for the write coordinator
//!
//! This module contains the sync level policy and the coordinator's tuning knobs.

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::common::config::{
    DEFAULT_BATCH_SIZE, DEFAULT_MAX_BATCH_AGE, DEFAULT_RETRY_INTERVAL, DEFAULT_WATCHER_THREADS,
};
use crate::common::exception::{CubeIoError, CubeResult};

/// How writes are accumulated and whether callers may block on them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncLevel {
    /// Every write is flushed on its own, never shared between callers
    FullSync,
    /// Writes are batched; blocking writes wait for the flush they trigger
    BatchSync,
    /// Writes are batched; only fire-and-forget writes are allowed
    BatchAsync,
}

impl fmt::Display for SyncLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncLevel::FullSync => "FULL_SYNC",
            SyncLevel::BatchSync => "BATCH_SYNC",
            SyncLevel::BatchAsync => "BATCH_ASYNC",
        };
        write!(f, "{}", name)
    }
}

/// Configuration for the write coordinator
///
/// Durations are kept exactly as given. On disk they are whole milliseconds under the
/// `max_batch_age_ms` and `retry_interval_ms` keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Flush once the in-progress batch holds this many distinct addresses.
    pub batch_size: usize,
    /// Flush on the next write once the oldest write is older than this.
    /// Not a hard ceiling: nothing flushes a stale batch until a write arrives.
    #[serde(rename = "max_batch_age_ms", with = "duration_millis")]
    pub max_batch_age: Duration,
    pub sync_level: SyncLevel,
    /// Fixed delay before resubmitting a batch the backend refused as busy.
    #[serde(rename = "retry_interval_ms", with = "duration_millis")]
    pub retry_interval: Duration,
    pub watcher_threads: usize,
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Writes whole milliseconds, rounding a sub-millisecond remainder up and saturating at
    /// `u64::MAX`.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut millis = duration.as_millis();
        if duration.subsec_nanos() % 1_000_000 != 0 {
            millis += 1;
        }
        u64::try_from(millis).unwrap_or(u64::MAX).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_batch_age: DEFAULT_MAX_BATCH_AGE,
            sync_level: SyncLevel::BatchSync,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            watcher_threads: DEFAULT_WATCHER_THREADS,
        }
    }
}

impl CoordinatorConfig {
    pub fn new(batch_size: usize, max_batch_age: Duration, sync_level: SyncLevel) -> Self {
        Self {
            batch_size,
            max_batch_age,
            sync_level,
            ..Self::default()
        }
    }

    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    pub fn load(path: &Path) -> CubeResult<Self> {
        let contents = fs::read_to_string(path)?;
        let config: CoordinatorConfig =
            toml::from_str(&contents).map_err(|e| CubeIoError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CubeResult<()> {
        if self.batch_size == 0 {
            return Err(CubeIoError::InvalidConfig("batch_size must be positive".to_string()));
        }
        if self.watcher_threads == 0 {
            return Err(CubeIoError::InvalidConfig("watcher_threads must be positive".to_string()));
        }
        Ok(())
    }

    pub fn max_batch_age(&self) -> Duration {
        self.max_batch_age
    }

    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }
}
