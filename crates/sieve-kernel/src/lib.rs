//! Sieve Kernel: a Sieve of Eratosthenes as a growing chain of actors.
//!
//! Each shard actor owns a bounded slice of the primes found so far and
//! filters candidates against it; the chain grows lazily as shards fill up.
//! A [`JoinScope`] tracks in-flight work across the whole chain so the driver
//! knows when it may read the shards. The crate also carries a fork/join
//! reciprocal sum that shares nothing with the pipeline but the idea of a
//! structured join.

pub mod actors;
pub mod config;
pub mod error;
pub mod messages;
pub mod reduction;
pub mod scope;
pub mod sieve;

pub use config::{ReductionConfig, SieveConfig};
pub use error::{Result, SieveError};
pub use messages::{CollectShard, ShardReport, SieveMessage, SpawnShard, SuccessorReady};
pub use reduction::{seq_reciprocal_sum, ReciprocalSum};
pub use scope::{JoinScope, WorkUnit};
pub use sieve::{count_primes_sequential, primes_sequential, SieveReport, SieveRuntime};
