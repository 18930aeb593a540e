//! Configuration types for the kernel.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SieveError};

/// Default number of primes each shard actor may hold.
pub const DEFAULT_SHARD_CAPACITY: usize = 1_000;

/// Default time the pipeline may go without any progress before a run is
/// reported as stalled.
pub const DEFAULT_STALL_TIMEOUT_MS: u64 = 30_000;

/// Default range length below which the reduction sums sequentially.
pub const DEFAULT_SEQUENTIAL_THRESHOLD: usize = 5_000;

/// Pipeline configuration.
///
/// Loaded from JSON at runtime, or built from defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SieveConfig {
    /// Maximum number of primes in one actor's shard
    pub shard_capacity: usize,

    /// Longest gap without any message being handled before a run fails
    pub stall_timeout_ms: u64,
}

/// Reduction task configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionConfig {
    /// Ranges at or below this length are summed without forking
    pub sequential_threshold: usize,

    /// Number of sub-ranges each split produces
    pub task_count: usize,

    /// Worker threads for the fork/join pool (None = one per core)
    pub worker_threads: Option<usize>,
}

impl Default for SieveConfig {
    fn default() -> Self {
        Self {
            shard_capacity: DEFAULT_SHARD_CAPACITY,
            stall_timeout_ms: DEFAULT_STALL_TIMEOUT_MS,
        }
    }
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            sequential_threshold: DEFAULT_SEQUENTIAL_THRESHOLD,
            task_count: 2,
            worker_threads: None,
        }
    }
}

impl SieveConfig {
    /// Config with the given shard capacity.
    pub fn with_capacity(shard_capacity: usize) -> Self {
        Self {
            shard_capacity,
            ..Default::default()
        }
    }

    /// Stall window as a duration.
    pub fn stall_timeout(&self) -> Duration {
        Duration::from_millis(self.stall_timeout_ms)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.shard_capacity == 0 {
            return Err(SieveError::InvalidConfig(
                "shard_capacity must be at least 1".to_string(),
            ));
        }
        if self.stall_timeout_ms == 0 {
            return Err(SieveError::InvalidConfig(
                "stall_timeout_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl ReductionConfig {
    /// Reject values the reduction cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sequential_threshold == 0 {
            return Err(SieveError::InvalidConfig(
                "sequential_threshold must be at least 1".to_string(),
            ));
        }
        if self.task_count == 0 {
            return Err(SieveError::InvalidTaskCount(0));
        }
        if self.worker_threads == Some(0) {
            return Err(SieveError::InvalidConfig(
                "worker_threads must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}
