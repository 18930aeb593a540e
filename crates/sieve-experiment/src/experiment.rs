//! Experiment runner: drives the sieve pipeline and the reciprocal sum.

use std::time::Instant;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use sieve_kernel::{
    count_primes_sequential, seq_reciprocal_sum, ReciprocalSum, SieveConfig, SieveRuntime,
};

use crate::config::ExperimentConfig;
use crate::results::{CountResult, GridResults, SumResult};

/// Generate `len` values in `[0.1, 1.0)` for the reciprocal sum.
pub fn generate_input(len: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(0.1..1.0)).collect()
}

/// Runs experiments against one configuration.
pub struct ExperimentRunner {
    config: ExperimentConfig,
}

impl ExperimentRunner {
    /// Create a runner; fails if the configuration is invalid.
    pub fn new(config: ExperimentConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Configuration this runner uses.
    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Count primes up to `limit`, optionally checking the sequential reference.
    pub async fn run_count(&self, limit: i64, verify: bool) -> Result<CountResult> {
        let mut sieve = SieveRuntime::launch(self.config.sieve.clone()).await?;
        let result = count_once(&mut sieve, limit, 0, verify).await;
        sieve.shutdown().await?;
        result
    }

    /// Run `trials` sieve runs for every `(limit, capacity)` pair.
    ///
    /// Each capacity gets its own runtime, shared by its trials.
    pub async fn run_grid(
        &self,
        limits: &[i64],
        capacities: &[usize],
        trials: usize,
        verify: bool,
    ) -> Result<GridResults> {
        let mut results = GridResults::new();
        let total = limits.len() * capacities.len() * trials;
        let mut completed = 0;

        for &capacity in capacities {
            let sieve_config = SieveConfig {
                shard_capacity: capacity,
                ..self.config.sieve.clone()
            };
            let mut sieve = SieveRuntime::launch(sieve_config)
                .await
                .with_context(|| format!("failed to launch sieve with capacity {capacity}"))?;

            for &limit in limits {
                for trial in 0..trials {
                    let result = count_once(&mut sieve, limit, trial, verify).await?;
                    results.add(result);
                    completed += 1;

                    info!(
                        progress = format!("{}/{}", completed, total),
                        limit = limit,
                        capacity = capacity,
                        trial = trial,
                        "Completed run"
                    );
                }
            }

            sieve.shutdown().await?;
        }

        results.compute_summary();
        Ok(results)
    }

    /// Compare the fork/join reciprocal sum against the sequential one.
    pub async fn run_sum(&self, len: usize, task_count: usize, seed: u64) -> Result<SumResult> {
        let reduction = self.config.reduction.clone();

        // The sum occupies the calling thread until the pool finishes.
        tokio::task::spawn_blocking(move || -> Result<SumResult> {
            let input = generate_input(len, seed);
            let pool = ReciprocalSum::new(reduction)?;

            let started = Instant::now();
            let parallel = pool.sum(&input, task_count)?;
            let parallel_ms = started.elapsed().as_millis() as u64;

            let started = Instant::now();
            let sequential = seq_reciprocal_sum(&input);
            let sequential_ms = started.elapsed().as_millis() as u64;

            let result = SumResult {
                len,
                task_count,
                sequential_threshold: pool.config().sequential_threshold,
                seed,
                parallel,
                sequential,
                parallel_ms,
                sequential_ms,
            };
            pool.shutdown();
            Ok(result)
        })
        .await
        .context("reciprocal sum task panicked")?
    }
}

async fn count_once(
    sieve: &mut SieveRuntime,
    limit: i64,
    trial: usize,
    verify: bool,
) -> Result<CountResult> {
    let started_at = Utc::now();
    let report = sieve
        .run(limit)
        .await
        .with_context(|| format!("sieve run failed for limit {limit}"))?;
    let ended_at = Utc::now();

    let reference_count = verify.then(|| count_primes_sequential(report.limit));
    let result = CountResult {
        trial,
        started_at,
        ended_at,
        report,
        reference_count,
    };

    if result.verified() == Some(false) {
        warn!(
            limit = limit,
            got = result.report.prime_count,
            expected = ?result.reference_count,
            "Pipeline disagrees with the reference sieve"
        );
        bail!(
            "prime count mismatch for limit {}: pipeline {}, reference {:?}",
            limit,
            result.report.prime_count,
            result.reference_count
        );
    }
    Ok(result)
}
