//! Message types for acton-reactive actor communication.
//!
//! [`SieveMessage`] flows downstream while a run is active. A shard that
//! overflows asks the driver for a successor with [`SpawnShard`] and learns
//! its handle from [`SuccessorReady`]. [`CollectShard`] walks the chain after
//! the run has gone quiet.

use acton_reactive::prelude::ActorHandle;
use tokio::sync::mpsc;

/// Traffic flowing down the shard chain.
///
/// Handled by a single `mutate_on` handler per actor and dispatched with
/// `match`, so adding a kind forces every handler to deal with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SieveMessage {
    /// An odd integer that survived every upstream shard
    Candidate(u64),
    /// No more candidates will follow
    Terminate,
}

/// Request from an overflowing shard for the driver to spawn its successor.
///
/// Travels over the driver's channel, not an actor mailbox: the driver owns
/// the runtime every shard lives in.
#[derive(Debug, Clone)]
pub struct SpawnShard {
    /// Position the new shard takes in the chain
    pub position: usize,
    /// First prime of the new shard
    pub seed: u64,
    /// Shard to tell once the successor is running
    pub predecessor: ActorHandle,
}

/// The successor a shard asked for is running.
#[derive(Debug, Clone)]
pub struct SuccessorReady {
    /// Handle of the new shard
    pub handle: ActorHandle,
}

/// Ask a shard actor to report its contents.
///
/// Only meaningful once the run's join scope has reported quiescence.
#[derive(Debug, Clone)]
pub struct CollectShard {
    /// Where the actor sends its [`ShardReport`]
    pub reply: mpsc::Sender<ShardReport>,
}

/// Snapshot of one actor's shard, sent in response to [`CollectShard`].
#[derive(Debug, Clone)]
pub struct ShardReport {
    /// Zero-based position of the actor in the chain
    pub position: usize,
    /// Primes held by this actor, in the order they were recorded
    pub primes: Vec<u64>,
    /// Successor, if this actor's shard overflowed and it has been linked
    pub next: Option<ActorHandle>,
    /// A successor was requested but never linked
    pub awaiting_successor: bool,
    /// Whether the termination sentinel reached this actor
    pub terminated: bool,
}

impl ShardReport {
    /// Number of primes in the shard.
    pub fn shard_count(&self) -> usize {
        self.primes.len()
    }
}
