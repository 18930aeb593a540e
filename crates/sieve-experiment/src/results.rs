//! Results collection and output for sieve experiments.
//!
//! Captures metrics like:
//! - Prime count and whether it matched the reference sieve
//! - Chain length and shard fill per run
//! - Wall-clock time per run
//! - Parallel vs sequential reciprocal sums

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sieve_kernel::SieveReport;

/// Results from a single sieve run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountResult {
    /// Trial number (for repeated runs)
    pub trial: usize,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// End time
    pub ended_at: DateTime<Utc>,
    /// What the pipeline reported
    pub report: SieveReport,
    /// Count from the sequential reference, when verification was requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_count: Option<usize>,
}

impl CountResult {
    /// `Some(true)` when verified and matching, `None` when not verified.
    pub fn verified(&self) -> Option<bool> {
        self.reference_count
            .map(|expected| expected == self.report.prime_count)
    }
}

/// Results from a single reciprocal-sum run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SumResult {
    /// Number of input elements
    pub len: usize,
    /// Sub-ranges per split
    pub task_count: usize,
    /// Sequential threshold used
    pub sequential_threshold: usize,
    /// Seed used to generate the input
    pub seed: u64,
    /// Fork/join result
    pub parallel: f64,
    /// Sequential reference result
    pub sequential: f64,
    /// Time spent in the fork/join sum
    pub parallel_ms: u64,
    /// Time spent in the sequential sum
    pub sequential_ms: u64,
}

impl SumResult {
    /// Absolute difference between the two sums.
    pub fn abs_diff(&self) -> f64 {
        (self.parallel - self.sequential).abs()
    }
}

/// Aggregate results from a grid experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridResults {
    /// All individual results
    pub results: Vec<CountResult>,
    /// Summary statistics by configuration
    pub summary: HashMap<String, ConfigSummary>,
}

/// Summary statistics for a configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub config_key: String,
    pub trials: usize,
    /// Prime count of the first trial (all trials must agree)
    pub prime_count: usize,
    /// Whether every trial produced the same prime count
    pub consistent: bool,
    pub actor_count: usize,
    pub avg_elapsed_ms: f64,
    /// Standard error of avg_elapsed_ms
    pub avg_elapsed_ms_se: f64,
    pub min_elapsed_ms: u64,
    pub max_elapsed_ms: u64,
}

impl GridResults {
    /// Create a new empty grid results.
    pub fn new() -> Self {
        Self {
            results: Vec::new(),
            summary: HashMap::new(),
        }
    }

    /// Add a result.
    pub fn add(&mut self, result: CountResult) {
        self.results.push(result);
    }

    /// Compute summary statistics.
    pub fn compute_summary(&mut self) {
        let mut by_config: HashMap<String, Vec<&CountResult>> = HashMap::new();

        for result in &self.results {
            let key = format!(
                "limit={}:capacity={}",
                result.report.limit, result.report.shard_capacity
            );
            by_config.entry(key).or_default().push(result);
        }

        for (key, results) in by_config {
            let trials = results.len();
            let n = trials as f64;

            let prime_count = results[0].report.prime_count;
            let consistent = results
                .iter()
                .all(|r| r.report.prime_count == prime_count);

            let elapsed: Vec<f64> = results
                .iter()
                .map(|r| r.report.elapsed_ms as f64)
                .collect();
            let avg_elapsed_ms = elapsed.iter().sum::<f64>() / n;

            // Standard error for continuous: SE = std_dev / sqrt(n)
            let avg_elapsed_ms_se = if trials > 1 {
                let variance = elapsed
                    .iter()
                    .map(|t| (t - avg_elapsed_ms).powi(2))
                    .sum::<f64>()
                    / (n - 1.0);
                variance.sqrt() / n.sqrt()
            } else {
                0.0
            };

            let min_elapsed_ms = results.iter().map(|r| r.report.elapsed_ms).min().unwrap_or(0);
            let max_elapsed_ms = results.iter().map(|r| r.report.elapsed_ms).max().unwrap_or(0);

            self.summary.insert(
                key.clone(),
                ConfigSummary {
                    config_key: key,
                    trials,
                    prime_count,
                    consistent,
                    actor_count: results[0].report.actor_count,
                    avg_elapsed_ms,
                    avg_elapsed_ms_se,
                    min_elapsed_ms,
                    max_elapsed_ms,
                },
            );
        }
    }

    /// Save results to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load results from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let results = serde_json::from_str(&json)?;
        Ok(results)
    }
}

impl Default for GridResults {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a duration in milliseconds for display.
pub fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{:.1}m", ms as f64 / 60_000.0)
    }
}
