//! Error type shared by the sieve pipeline and the reduction task.

use thiserror::Error;

/// Errors surfaced at the kernel boundary.
///
/// Input errors are raised before any actor or task is created. Invariant
/// violations are raised by actors during a run and reported to the driver
/// once the pipeline has gone quiet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SieveError {
    /// `count_primes` was called with a negative limit.
    #[error("limit must be non-negative, got {0}")]
    NegativeLimit(i64),

    /// The reduction was asked to split into zero tasks.
    #[error("task count must be at least 1, got {0}")]
    InvalidTaskCount(usize),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An actor observed state it should never see. Shard contents are not
    /// trustworthy after this.
    #[error("pipeline invariant violated: {0}")]
    InvariantViolation(String),

    /// Walking the chain after quiescence did not reach the tail.
    #[error("shard chain broken at position {0}")]
    ChainBroken(usize),

    /// The actor runtime or thread pool failed underneath us.
    #[error("runtime failure: {0}")]
    Runtime(String),
}

/// Convenience alias used throughout the kernel.
pub type Result<T> = std::result::Result<T, SieveError>;
