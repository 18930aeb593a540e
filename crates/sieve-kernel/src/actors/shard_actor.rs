//! PrimeShardActor: one link of the sieve pipeline.
//!
//! Each actor owns a bounded shard of primes and filters candidates by trial
//! division against it. A candidate that survives is either recorded locally,
//! used to seed a new successor when the shard is full, or forwarded to the
//! successor that already exists.
//!
//! ```text
//! Candidate(c) → Shard[i]
//!   ├─ divisible by a local prime      → dropped
//!   ├─ shard has room                  → recorded
//!   ├─ shard full, no successor        → SpawnShard { seed: c } → driver
//!   ├─ shard full, successor requested → held until SuccessorReady
//!   └─ shard full, successor linked    → Candidate(c) → Shard[i+1]
//! ```
//!
//! The driver owns the runtime, so it spawns every successor and answers
//! with [`SuccessorReady`]. Survivors that arrive in between are held in
//! order and flushed ahead of anything forwarded later, so each shard still
//! sees candidates in ascending order. By the time a composite arrives every
//! prime factor small enough to reject it is already recorded upstream or
//! locally.

use acton_reactive::prelude::*;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::messages::{CollectShard, ShardReport, SieveMessage, SpawnShard, SuccessorReady};
use crate::scope::JoinScope;

/// Outcome of routing one message through a shard.
#[derive(Debug, Clone)]
pub enum Route {
    /// Divisible by a local prime
    Composite,
    /// Appended to the local shard
    Recorded,
    /// Locally prime, shard full, no successor yet
    SpawnNext,
    /// Held until the requested successor is linked
    Held,
    /// Pass to the successor
    Forward(ActorHandle),
    /// Nothing downstream
    Tail,
}

/// The next link of the chain, as seen from one shard.
#[derive(Debug, Clone, Default)]
pub enum Successor {
    /// Shard has never overflowed
    #[default]
    Absent,
    /// Successor requested from the driver; messages held in arrival order
    Requested(Vec<SieveMessage>),
    /// Successor running
    Linked(ActorHandle),
}

/// Actor state for PrimeShardActor.
///
/// Mutated only by this actor's own `mutate_on` handlers.
#[derive(Default, Clone)]
pub struct PrimeShardState {
    /// Run this shard belongs to (for actor naming)
    pub run: u64,
    /// Zero-based position in the chain
    pub position: usize,
    /// Maximum number of primes in `shard`
    pub capacity: usize,
    /// Primes recorded by this actor, ascending
    pub shard: Vec<u64>,
    /// Next link, requested at most once when the shard overflows
    pub successor: Successor,
    /// Whether the termination sentinel has arrived
    pub terminated: bool,
    /// Quiescence tracker for the current run
    pub scope: Option<JoinScope>,
    /// Driver channel for successor requests
    pub spawner: Option<mpsc::UnboundedSender<SpawnShard>>,
}

impl std::fmt::Debug for PrimeShardState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let successor = match &self.successor {
            Successor::Absent => "absent",
            Successor::Requested(_) => "requested",
            Successor::Linked(_) => "linked",
        };
        f.debug_struct("PrimeShardState")
            .field("run", &self.run)
            .field("position", &self.position)
            .field("capacity", &self.capacity)
            .field("shard_count", &self.shard.len())
            .field("successor", &successor)
            .field("terminated", &self.terminated)
            .finish()
    }
}

impl PrimeShardState {
    /// Whether any local prime divides `candidate`.
    pub fn is_locally_composite(&self, candidate: u64) -> bool {
        self.shard.iter().any(|prime| candidate % prime == 0)
    }

    /// Whether the shard can take another prime.
    pub fn has_capacity(&self) -> bool {
        self.shard.len() < self.capacity
    }

    /// Filter `candidate` and record it if it belongs here.
    ///
    /// Returns what the caller still has to do with it. `SpawnNext` moves
    /// the successor to `Requested`, so it is returned at most once.
    pub fn route(&mut self, candidate: u64) -> Route {
        if self.is_locally_composite(candidate) {
            return Route::Composite;
        }
        if self.has_capacity() {
            self.shard.push(candidate);
            return Route::Recorded;
        }
        match &mut self.successor {
            Successor::Absent => {
                self.successor = Successor::Requested(Vec::new());
                Route::SpawnNext
            }
            Successor::Requested(held) => {
                held.push(SieveMessage::Candidate(candidate));
                Route::Held
            }
            Successor::Linked(next) => Route::Forward(next.clone()),
        }
    }

    /// Mark the sentinel as seen and decide where it goes next.
    pub fn route_sentinel(&mut self) -> Route {
        self.terminated = true;
        match &mut self.successor {
            Successor::Absent => Route::Tail,
            Successor::Requested(held) => {
                held.push(SieveMessage::Terminate);
                Route::Held
            }
            Successor::Linked(next) => Route::Forward(next.clone()),
        }
    }

    /// Link the requested successor, returning the held messages.
    ///
    /// `None` if no successor was requested or one is already linked.
    pub fn link(&mut self, next: ActorHandle) -> Option<Vec<SieveMessage>> {
        match std::mem::take(&mut self.successor) {
            Successor::Requested(held) => {
                self.successor = Successor::Linked(next);
                Some(held)
            }
            other => {
                self.successor = other;
                None
            }
        }
    }

    fn report(&self) -> ShardReport {
        let (next, awaiting_successor) = match &self.successor {
            Successor::Absent => (None, false),
            Successor::Requested(_) => (None, true),
            Successor::Linked(next) => (Some(next.clone()), false),
        };
        ShardReport {
            position: self.position,
            primes: self.shard.clone(),
            next,
            awaiting_successor,
            terminated: self.terminated,
        }
    }
}

/// One link of the sieve pipeline.
///
/// Handles:
/// - `SieveMessage::Candidate` - filter, record, request, hold or forward
/// - `SieveMessage::Terminate` - mark and pass the sentinel downstream
/// - `SuccessorReady` - link the successor and flush held messages
/// - `CollectShard` - report shard contents after quiescence
pub struct PrimeShardActor {
    run: u64,
    position: usize,
    seed: u64,
    capacity: usize,
    scope: JoinScope,
    spawner: mpsc::UnboundedSender<SpawnShard>,
}

impl PrimeShardActor {
    /// Create a shard actor seeded with its first prime.
    pub fn new(
        run: u64,
        position: usize,
        seed: u64,
        capacity: usize,
        scope: JoinScope,
        spawner: mpsc::UnboundedSender<SpawnShard>,
    ) -> Self {
        Self {
            run,
            position,
            seed,
            capacity,
            scope,
            spawner,
        }
    }

    /// Spawn this shard actor in the given runtime.
    pub async fn spawn(self, runtime: &mut ActorRuntime) -> ActorHandle {
        let name = format!("Shard:{}-{}", self.run, self.position);
        let mut actor = runtime.new_actor_with_name::<PrimeShardState>(name);

        actor.model.run = self.run;
        actor.model.position = self.position;
        actor.model.capacity = self.capacity;
        actor.model.shard = Vec::with_capacity(self.capacity);
        actor.model.shard.push(self.seed);
        actor.model.scope = Some(self.scope);
        actor.model.spawner = Some(self.spawner);

        debug!(
            run = self.run,
            position = self.position,
            seed = self.seed,
            "PrimeShardActor: created"
        );

        configure_shard_actor(&mut actor);
        actor.start().await
    }
}

/// Configure message handlers for the PrimeShardActor.
fn configure_shard_actor(actor: &mut ManagedActor<Idle, PrimeShardState>) {
    // mutate_on: one message at a time, exclusive access to the shard
    actor.mutate_on::<SieveMessage>(|actor, context| {
        let msg = *context.message();

        let Some(scope) = actor.model.scope.clone() else {
            warn!(
                position = actor.model.position,
                "PrimeShardActor: scope not initialized"
            );
            return Reply::ready();
        };
        let unit = scope.unit("shard message handler");
        let position = actor.model.position;

        if actor.model.terminated {
            scope.fault(format!(
                "shard {} received {:?} after the sentinel",
                position, msg
            ));
            unit.finish();
            return Reply::ready();
        }

        let route = match msg {
            SieveMessage::Terminate => actor.model.route_sentinel(),
            SieveMessage::Candidate(candidate) if candidate < 3 || candidate % 2 == 0 => {
                scope.fault(format!(
                    "shard {} received non-odd candidate {}",
                    position, candidate
                ));
                unit.finish();
                return Reply::ready();
            }
            SieveMessage::Candidate(candidate) => actor.model.route(candidate),
        };

        match route {
            Route::Composite | Route::Held => {
                unit.finish();
                Reply::ready()
            }
            Route::Recorded => {
                trace!(position, prime = ?msg, "PrimeShardActor: recorded");
                unit.finish();
                Reply::ready()
            }
            Route::Tail => {
                debug!(
                    position,
                    shard_count = actor.model.shard.len(),
                    "PrimeShardActor: sentinel reached tail"
                );
                unit.finish();
                Reply::ready()
            }
            Route::Forward(next) => {
                scope.enter();
                Reply::pending(async move {
                    next.send(msg).await;
                    unit.finish();
                })
            }
            Route::SpawnNext => {
                let SieveMessage::Candidate(seed) = msg else {
                    unit.finish();
                    return Reply::ready();
                };
                let request = SpawnShard {
                    position: position + 1,
                    seed,
                    predecessor: actor.handle().clone(),
                };

                // Retired by the SuccessorReady handler.
                scope.enter();
                let sent = actor
                    .model
                    .spawner
                    .as_ref()
                    .is_some_and(|spawner| spawner.send(request).is_ok());
                if !sent {
                    scope.fault(format!(
                        "shard {} could not request a successor",
                        position
                    ));
                    scope.exit();
                } else {
                    debug!(position, seed, "PrimeShardActor: successor requested");
                }

                unit.finish();
                Reply::ready()
            }
        }
    });

    actor.mutate_on::<SuccessorReady>(|actor, context| {
        let next = context.message().handle.clone();

        let Some(scope) = actor.model.scope.clone() else {
            warn!(
                position = actor.model.position,
                "PrimeShardActor: scope not initialized"
            );
            return Reply::ready();
        };
        let unit = scope.unit("successor link handler");

        let Some(held) = actor.model.link(next.clone()) else {
            scope.fault(format!(
                "shard {} was given a successor it did not request",
                actor.model.position
            ));
            unit.finish();
            return Reply::ready();
        };

        debug!(
            position = actor.model.position,
            held = held.len(),
            "PrimeShardActor: successor linked"
        );
        if held.is_empty() {
            unit.finish();
            return Reply::ready();
        }

        for _ in &held {
            scope.enter();
        }
        Reply::pending(async move {
            for msg in held {
                next.send(msg).await;
            }
            unit.finish();
        })
    });

    // Also mutate_on: the chain is idle by now, and read-only handlers
    // are only flushed on a timer.
    actor.mutate_on::<CollectShard>(|actor, context| {
        let reply = context.message().reply.clone();
        let report = actor.model.report();

        Reply::pending(async move {
            if reply.send(report).await.is_err() {
                warn!("PrimeShardActor: collector dropped before report was sent");
            }
        })
    });
}
