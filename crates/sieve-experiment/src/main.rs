//! Sieve Experiment CLI.
//!
//! Commands:
//! - count: Count primes with the actor pipeline
//! - sum: Run the fork/join reciprocal sum
//! - grid: Sweep limits × shard capacities × trials and save results

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use sieve_experiment::config::ExperimentConfig;
use sieve_experiment::experiment::ExperimentRunner;
use sieve_experiment::results::format_duration;

/// Generate a timestamped output path from the given path.
/// e.g., "results.json" -> "results-20260108-010530.json"
fn timestamped_path(path: &Path) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d-%H%M%S");
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("results");
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("json");
    let parent = path.parent().unwrap_or(std::path::Path::new("."));
    parent.join(format!("{}-{}.{}", stem, timestamp, ext))
}

#[derive(Parser)]
#[command(name = "sieve-experiment")]
#[command(version)]
#[command(about = "Actor-pipeline sieve and fork/join reciprocal sum experiments")]
struct Cli {
    /// JSON configuration file
    #[arg(long, env = "SIEVE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Count primes up to a limit
    Count {
        /// Inclusive upper bound
        #[arg(long, allow_negative_numbers = true)]
        limit: i64,

        /// Primes per shard actor (overrides config)
        #[arg(long)]
        capacity: Option<usize>,

        /// Check the count against the sequential sieve
        #[arg(long)]
        verify: bool,
    },

    /// Sum reciprocals of a generated array
    Sum {
        /// Number of elements
        #[arg(long, default_value = "1000000")]
        len: usize,

        /// Sub-ranges per split (overrides config)
        #[arg(long)]
        tasks: Option<usize>,

        /// Sequential threshold (overrides config)
        #[arg(long)]
        threshold: Option<usize>,

        /// Random seed for the input
        #[arg(long, default_value = "0")]
        seed: u64,
    },

    /// Run grid experiment
    Grid {
        /// Limits to sieve (comma-separated)
        #[arg(long, default_value = "10000,100000", value_delimiter = ',')]
        limits: Vec<i64>,

        /// Shard capacities to test (comma-separated)
        #[arg(long, default_value = "10,100,1000", value_delimiter = ',')]
        capacities: Vec<usize>,

        /// Number of trials per configuration
        #[arg(long, default_value = "3")]
        trials: usize,

        /// Check every count against the sequential sieve
        #[arg(long)]
        verify: bool,

        /// Output file for results
        #[arg(long, default_value = "results.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    let mut config = match &cli.config {
        Some(path) => ExperimentConfig::load(path)?,
        None => ExperimentConfig::default(),
    };

    match cli.command {
        Commands::Count {
            limit,
            capacity,
            verify,
        } => {
            if let Some(capacity) = capacity {
                config.sieve.shard_capacity = capacity;
            }

            let runner = ExperimentRunner::new(config)?;
            let result = runner.run_count(limit, verify).await?;
            let report = &result.report;

            println!("\n=== Sieve Result ===");
            println!("Limit: {}", report.limit);
            println!("Primes: {}", report.prime_count);
            println!("Shard capacity: {}", report.shard_capacity);
            println!("Actors: {}", report.actor_count);
            println!("Elapsed: {}", format_duration(report.elapsed_ms));
            match result.verified() {
                Some(true) => println!("Verified against sequential sieve"),
                Some(false) => println!("MISMATCH against sequential sieve"),
                None => {}
            }

            if let Some(tail) = report.shard_sizes.last() {
                println!("Tail shard fill: {}/{}", tail, report.shard_capacity);
            }
        }

        Commands::Sum {
            len,
            tasks,
            threshold,
            seed,
        } => {
            if let Some(threshold) = threshold {
                config.reduction.sequential_threshold = threshold;
            }
            let task_count = tasks.unwrap_or(config.reduction.task_count);

            let runner = ExperimentRunner::new(config)?;
            let result = runner.run_sum(len, task_count, seed).await?;

            println!("\n=== Reciprocal Sum ===");
            println!("Elements: {}", result.len);
            println!("Tasks: {}", result.task_count);
            println!("Threshold: {}", result.sequential_threshold);
            println!(
                "Parallel:   {:.12} ({})",
                result.parallel,
                format_duration(result.parallel_ms)
            );
            println!(
                "Sequential: {:.12} ({})",
                result.sequential,
                format_duration(result.sequential_ms)
            );
            println!("Difference: {:e}", result.abs_diff());
        }

        Commands::Grid {
            limits,
            capacities,
            trials,
            verify,
            output,
        } => {
            info!(
                limits = ?limits,
                capacities = ?capacities,
                trials = trials,
                "Starting grid experiment"
            );

            let runner = ExperimentRunner::new(config)?;
            let results = runner.run_grid(&limits, &capacities, trials, verify).await?;

            let output_path = timestamped_path(&output);
            results.save(&output_path)?;

            println!("\n=== Grid Experiment Complete ===");
            println!("Results saved to: {}", output_path.display());
            println!("\nSummary:");

            let mut keys: Vec<_> = results.summary.keys().collect();
            keys.sort();
            for key in keys {
                let summary = &results.summary[key];
                println!(
                    "  {}: primes={}, actors={}, avg={:.1}ms (±{:.1}), consistent={}",
                    key,
                    summary.prime_count,
                    summary.actor_count,
                    summary.avg_elapsed_ms,
                    summary.avg_elapsed_ms_se,
                    summary.consistent
                );
            }
        }
    }

    Ok(())
}
