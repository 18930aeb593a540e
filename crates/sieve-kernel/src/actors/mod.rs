//! Acton-reactive actors for the sieve pipeline.
//!
//! ```text
//! driver
//!   ├─ Candidate(3), Candidate(5), … (ascending) → Shard[0]
//!   │     ├─ Candidate(c) → Shard[1] → … → Shard[n-1]
//!   │     └─ SpawnShard → driver spawns Shard[i+1] → SuccessorReady
//!   ├─ Terminate → Shard[0] → … → Shard[n-1]
//!   ├─ JoinScope::wait (quiescence)
//!   └─ CollectShard → Shard[i] → ShardReport { next } → walk to tail
//! ```
//!
//! Every shard owns its primes; the only cross-actor write is the driver
//! handing a shard the successor it asked for.

mod shard_actor;

pub use shard_actor::{PrimeShardActor, PrimeShardState, Route, Successor};
