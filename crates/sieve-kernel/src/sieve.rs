//! The pipeline driver: bootstraps the shard chain and aggregates its counts.
//!
//! ## Usage
//!
//! ```ignore
//! use sieve_kernel::{SieveConfig, SieveRuntime};
//!
//! let mut sieve = SieveRuntime::launch(SieveConfig::default()).await?;
//! assert_eq!(sieve.count_primes(30).await?, 10);
//! sieve.shutdown().await?;
//! ```

use std::time::{Duration, Instant};

use acton_reactive::prelude::*;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::actors::PrimeShardActor;
use crate::config::SieveConfig;
use crate::error::{Result, SieveError};
use crate::messages::{CollectShard, ShardReport, SieveMessage, SpawnShard, SuccessorReady};
use crate::scope::JoinScope;

/// Upper bound on how long a quiet shard may take to answer `CollectShard`.
const COLLECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of a single sieve run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SieveReport {
    /// Inclusive upper bound that was sieved
    pub limit: u64,
    /// Number of primes in `[2, limit]`
    pub prime_count: usize,
    /// Number of shard actors the chain grew to
    pub actor_count: usize,
    /// Shard sizes in chain order
    pub shard_sizes: Vec<usize>,
    /// Shard capacity used for the run
    pub shard_capacity: usize,
    /// Wall-clock time from first spawn to last report
    pub elapsed_ms: u64,
}

/// Explicit scheduling context for sieve runs.
///
/// Owns the acton runtime every shard actor is spawned into. Runs are
/// independent: each gets its own chain and its own join scope, and the
/// chain is stopped once its counts have been read.
pub struct SieveRuntime {
    runtime: ActorRuntime,
    config: SieveConfig,
    runs: u64,
}

impl std::fmt::Debug for SieveRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SieveRuntime")
            .field("config", &self.config)
            .field("runs", &self.runs)
            .finish()
    }
}

impl SieveRuntime {
    /// Launch a fresh actor runtime for sieving.
    pub async fn launch(config: SieveConfig) -> Result<Self> {
        config.validate()?;
        let runtime = ActonApp::launch_async().await;
        Ok(Self {
            runtime,
            config,
            runs: 0,
        })
    }

    /// Configuration this runtime sieves with.
    pub fn config(&self) -> &SieveConfig {
        &self.config
    }

    /// Count the primes in `[2, limit]`.
    pub async fn count_primes(&mut self, limit: i64) -> Result<usize> {
        Ok(self.run(limit).await?.prime_count)
    }

    /// Sieve up to `limit` and report chain statistics alongside the count.
    pub async fn run(&mut self, limit: i64) -> Result<SieveReport> {
        let started = Instant::now();
        let limit = checked_limit(limit)?;
        let reports = self.sieve(limit).await?;

        let shard_sizes: Vec<usize> = reports.iter().map(ShardReport::shard_count).collect();
        let report = SieveReport {
            limit,
            prime_count: shard_sizes.iter().sum(),
            actor_count: reports.len(),
            shard_sizes,
            shard_capacity: self.config.shard_capacity,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            limit = report.limit,
            primes = report.prime_count,
            actors = report.actor_count,
            capacity = report.shard_capacity,
            elapsed_ms = report.elapsed_ms,
            "Sieve run complete"
        );
        Ok(report)
    }

    /// Sieve up to `limit` and return every prime found, ascending.
    pub async fn collect_primes(&mut self, limit: i64) -> Result<Vec<u64>> {
        let limit = checked_limit(limit)?;
        let reports = self.sieve(limit).await?;
        Ok(reports.into_iter().flat_map(|report| report.primes).collect())
    }

    /// Stop every actor and release the runtime.
    pub async fn shutdown(mut self) -> Result<()> {
        self.runtime
            .shutdown_all()
            .await
            .map_err(|e| SieveError::Runtime(format!("shutdown failed: {e}")))?;
        Ok(())
    }

    /// Run the pipeline and return the shard reports in chain order.
    async fn sieve(&mut self, limit: u64) -> Result<Vec<ShardReport>> {
        if limit < 2 {
            return Ok(Vec::new());
        }

        self.runs += 1;
        let run = self.runs;
        let scope = JoinScope::new();
        let (spawn_tx, mut spawn_rx) = mpsc::unbounded_channel();

        let first = PrimeShardActor::new(
            run,
            0,
            2,
            self.config.shard_capacity,
            scope.clone(),
            spawn_tx.clone(),
        )
        .spawn(&mut self.runtime)
        .await;

        // Every shard of the run, in spawn order.
        let mut spawned = vec![first.clone()];

        let inject = inject_candidates(first.clone(), limit, scope.clone());
        tokio::pin!(inject);
        let mut injected = false;
        let stall = self.config.stall_timeout();

        // Serve successor requests until the chain goes quiet.
        let quiesced = loop {
            tokio::select! {
                () = &mut inject, if !injected => {
                    injected = true;
                    debug!(run, limit, "Candidates injected, waiting for quiescence");
                }
                Some(request) = spawn_rx.recv() => {
                    let handle = self.spawn_successor(run, &scope, &spawn_tx, request).await;
                    spawned.push(handle);
                }
                result = scope.wait_or_stall(stall), if injected => {
                    break result;
                }
            }
        };

        let walked = match &quiesced {
            Ok(()) => walk_chain(&first).await,
            Err(_) => Ok(Vec::new()),
        };

        // Discard the chain whatever happened.
        for handle in &spawned {
            if let Err(e) = handle.stop().await {
                warn!(run, actor = %handle.id(), error = %e, "Failed to stop shard actor");
            }
        }

        quiesced?;
        let reports = walked?;

        if reports.len() != spawned.len() {
            return Err(SieveError::InvariantViolation(format!(
                "{} shards spawned but {} reachable from the first",
                spawned.len(),
                reports.len()
            )));
        }
        if let Some(report) = reports.iter().find(|r| !r.terminated) {
            return Err(SieveError::InvariantViolation(format!(
                "sentinel never reached shard {}",
                report.position
            )));
        }
        Ok(reports)
    }

    /// Spawn the successor a shard asked for and link it.
    async fn spawn_successor(
        &mut self,
        run: u64,
        scope: &JoinScope,
        spawner: &mpsc::UnboundedSender<SpawnShard>,
        request: SpawnShard,
    ) -> ActorHandle {
        let handle = PrimeShardActor::new(
            run,
            request.position,
            request.seed,
            self.config.shard_capacity,
            scope.clone(),
            spawner.clone(),
        )
        .spawn(&mut self.runtime)
        .await;

        request
            .predecessor
            .send(SuccessorReady {
                handle: handle.clone(),
            })
            .await;
        handle
    }
}

/// Send every odd candidate in `[3, limit]` in ascending order, then the
/// sentinel.
async fn inject_candidates(first: ActorHandle, limit: u64, scope: JoinScope) {
    for candidate in (3..=limit).step_by(2) {
        scope.enter();
        first.send(SieveMessage::Candidate(candidate)).await;
    }
    scope.enter();
    first.send(SieveMessage::Terminate).await;
}

/// Walk from `first` to the tail, collecting one report per shard.
async fn walk_chain(first: &ActorHandle) -> Result<Vec<ShardReport>> {
    let mut reports = Vec::new();
    let mut current = Some(first.clone());

    while let Some(handle) = current {
        let position = reports.len();
        let (tx, mut rx) = mpsc::channel(1);
        handle.send(CollectShard { reply: tx }).await;

        let report = match tokio::time::timeout(COLLECT_TIMEOUT, rx.recv()).await {
            Ok(Some(report)) => report,
            Ok(None) => return Err(SieveError::ChainBroken(position)),
            Err(_) => {
                warn!(position, "Shard did not answer CollectShard in time");
                return Err(SieveError::ChainBroken(position));
            }
        };

        if report.position != position {
            return Err(SieveError::InvariantViolation(format!(
                "shard at chain index {} reports position {}",
                position, report.position
            )));
        }
        if report.awaiting_successor {
            return Err(SieveError::InvariantViolation(format!(
                "shard {} is still waiting for its successor",
                position
            )));
        }

        current = report.next.clone();
        reports.push(report);
    }

    Ok(reports)
}

fn checked_limit(limit: i64) -> Result<u64> {
    u64::try_from(limit).map_err(|_| SieveError::NegativeLimit(limit))
}

/// Classic boolean-array sieve, used as the trusted reference.
pub fn primes_sequential(limit: u64) -> Vec<u64> {
    if limit < 2 {
        return Vec::new();
    }
    let n = limit as usize;
    let mut composite = vec![false; n + 1];
    let mut primes = Vec::new();

    for i in 2..=n {
        if composite[i] {
            continue;
        }
        primes.push(i as u64);
        let mut multiple = i.saturating_mul(i);
        while multiple <= n {
            composite[multiple] = true;
            multiple += i;
        }
    }
    primes
}

/// Count of primes in `[2, limit]` by the reference sieve.
pub fn count_primes_sequential(limit: u64) -> usize {
    primes_sequential(limit).len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_sieve_small_limits() {
        assert_eq!(count_primes_sequential(0), 0);
        assert_eq!(count_primes_sequential(1), 0);
        assert_eq!(count_primes_sequential(2), 1);
        assert_eq!(count_primes_sequential(3), 2);
        assert_eq!(
            primes_sequential(30),
            vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]
        );
        assert_eq!(count_primes_sequential(100_000), 9_592);
    }

    #[test]
    fn test_negative_limit_rejected() {
        assert_eq!(checked_limit(-1), Err(SieveError::NegativeLimit(-1)));
        assert_eq!(checked_limit(0), Ok(0));
    }

    #[tokio::test]
    async fn test_count_primes_thirty() {
        let mut sieve = SieveRuntime::launch(SieveConfig::with_capacity(3))
            .await
            .unwrap();
        assert_eq!(sieve.count_primes(30).await.unwrap(), 10);
        sieve.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_every_shard_registered_with_runtime() {
        let mut sieve = SieveRuntime::launch(SieveConfig::with_capacity(3))
            .await
            .unwrap();
        let before = sieve.runtime.actor_count();
        let report = sieve.run(30).await.unwrap();

        // 10 primes in shards of 3
        assert_eq!(report.actor_count, 4);
        assert_eq!(sieve.runtime.actor_count() - before, report.actor_count);
        sieve.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_below_two_builds_no_chain() {
        let mut sieve = SieveRuntime::launch(SieveConfig::default()).await.unwrap();
        for limit in [0, 1] {
            let report = sieve.run(limit).await.unwrap();
            assert_eq!(report.prime_count, 0);
            assert_eq!(report.actor_count, 0);
        }
        sieve.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_negative_limit_fails_before_spawning() {
        let mut sieve = SieveRuntime::launch(SieveConfig::default()).await.unwrap();
        let err = sieve.count_primes(-5).await.unwrap_err();
        assert_eq!(err, SieveError::NegativeLimit(-5));
        assert_eq!(sieve.runs, 0);
        sieve.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_launch_rejects_zero_capacity() {
        let err = SieveRuntime::launch(SieveConfig::with_capacity(0))
            .await
            .unwrap_err();
        assert!(matches!(err, SieveError::InvalidConfig(_)));
    }
}
