//! JoinScope: quiescence tracking for work that spreads across actors.
//!
//! Every unit of work is registered with [`JoinScope::enter`] before it is
//! handed to a mailbox, and retired with [`JoinScope::exit`] once its handler
//! has finished. A handler that forwards or spawns registers the follow-up
//! work *before* retiring its own message, so the count cannot touch zero
//! while anything is still in flight anywhere in the chain:
//!
//! ```text
//! driver   enter ─ send(c) ─────────────────────────────────────────
//! shard 0            handle(c): enter ─ send(c) → shard 1 ─ exit
//! shard 1                                  handle(c): append ─ exit
//!                                                            └─ count == 0
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::warn;

use crate::error::{Result, SieveError};

#[derive(Debug, Clone, Default)]
struct ScopeState {
    in_flight: usize,
    fault: Option<String>,
}

/// Structured join primitive shared by the driver and every actor of a run.
///
/// Cloning is cheap; all clones observe the same counter.
#[derive(Clone)]
pub struct JoinScope {
    state: Arc<watch::Sender<ScopeState>>,
}

impl std::fmt::Debug for JoinScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("JoinScope")
            .field("in_flight", &state.in_flight)
            .field("faulted", &state.fault.is_some())
            .finish()
    }
}

impl Default for JoinScope {
    fn default() -> Self {
        Self::new()
    }
}

impl JoinScope {
    /// Open a new, idle scope.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ScopeState::default());
        Self {
            state: Arc::new(tx),
        }
    }

    /// Register one unit of in-flight work.
    pub fn enter(&self) {
        self.state.send_modify(|state| state.in_flight += 1);
    }

    /// Retire one unit of in-flight work.
    pub fn exit(&self) {
        self.state.send_modify(|state| {
            if state.in_flight == 0 {
                state
                    .fault
                    .get_or_insert_with(|| "exit without matching enter".to_string());
            } else {
                state.in_flight -= 1;
            }
        });
    }

    /// Take charge of one unit registered with [`enter`](Self::enter).
    ///
    /// The unit is retired when the returned [`WorkUnit`] is finished or
    /// dropped. Dropping it unfinished (a handler panicked, or its future
    /// was discarded) also records a fault.
    pub fn unit(&self, label: &'static str) -> WorkUnit {
        WorkUnit {
            scope: self.clone(),
            label,
            finished: false,
        }
    }

    /// Record an invariant violation. Only the first fault is kept.
    pub fn fault(&self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(reason = %reason, "JoinScope: fault recorded");
        self.state.send_modify(|state| {
            state.fault.get_or_insert(reason);
        });
    }

    /// Number of units currently in flight.
    pub fn in_flight(&self) -> usize {
        self.state.borrow().in_flight
    }

    /// Whether any unit of work has reported a fault.
    pub fn is_faulted(&self) -> bool {
        self.state.borrow().fault.is_some()
    }

    /// Suspend until nothing is in flight.
    ///
    /// Returns the first recorded fault as an error.
    pub async fn wait(&self) -> Result<()> {
        self.wait_inner(None).await
    }

    /// Like [`wait`](Self::wait), but give up once the scope has gone
    /// `stall` without any unit entering, exiting or faulting.
    ///
    /// A run that keeps making progress is never cut short.
    pub async fn wait_or_stall(&self, stall: Duration) -> Result<()> {
        self.wait_inner(Some(stall)).await
    }

    async fn wait_inner(&self, stall: Option<Duration>) -> Result<()> {
        let mut rx = self.state.subscribe();
        loop {
            {
                let state = rx.borrow_and_update();
                if state.in_flight == 0 {
                    return match &state.fault {
                        Some(reason) => Err(SieveError::InvariantViolation(reason.clone())),
                        None => Ok(()),
                    };
                }
            }

            let changed = match stall {
                Some(stall) => match tokio::time::timeout(stall, rx.changed()).await {
                    Ok(changed) => changed,
                    Err(_) => {
                        let state = rx.borrow();
                        return Err(SieveError::Runtime(format!(
                            "no progress for {:?} with {} unit(s) in flight{}",
                            stall,
                            state.in_flight,
                            state
                                .fault
                                .as_ref()
                                .map(|reason| format!(" (fault: {reason})"))
                                .unwrap_or_default()
                        )));
                    }
                },
                None => rx.changed().await,
            };
            changed.map_err(|e| SieveError::Runtime(format!("join scope closed: {e}")))?;
        }
    }
}

/// One in-flight unit owned by the code handling it.
///
/// Moves into a handler's reply future when the work outlives the handler.
#[must_use = "dropping a WorkUnit unfinished records a fault"]
pub struct WorkUnit {
    scope: JoinScope,
    label: &'static str,
    finished: bool,
}

impl std::fmt::Debug for WorkUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkUnit")
            .field("label", &self.label)
            .field("finished", &self.finished)
            .finish()
    }
}

impl WorkUnit {
    /// Retire the unit normally.
    pub fn finish(mut self) {
        self.finished = true;
        self.scope.exit();
    }
}

impl Drop for WorkUnit {
    fn drop(&mut self) {
        if !self.finished {
            self.scope.fault(format!("{} did not finish", self.label));
            self.scope.exit();
        }
    }
}
