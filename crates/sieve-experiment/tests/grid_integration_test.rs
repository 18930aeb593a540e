//! Integration tests for the experiment harness.
//!
//! Runs a small grid end to end and round-trips the results file.

use sieve_experiment::config::ExperimentConfig;
use sieve_experiment::experiment::ExperimentRunner;
use sieve_experiment::results::GridResults;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_grid_results_survive_save_and_load() {
    let runner = ExperimentRunner::new(ExperimentConfig::default()).unwrap();
    let grid = runner
        .run_grid(&[0, 2, 1_000], &[1, 168, 1_000], 1, true)
        .await
        .unwrap();

    assert_eq!(grid.results.len(), 9);
    assert!(grid.results.iter().all(|r| r.verified() == Some(true)));

    // One shard per prime at capacity 1, a single shard once it fits.
    assert_eq!(grid.summary["limit=1000:capacity=1"].actor_count, 168);
    assert_eq!(grid.summary["limit=1000:capacity=168"].actor_count, 1);
    assert_eq!(grid.summary["limit=0:capacity=1000"].actor_count, 0);
    assert_eq!(grid.summary["limit=2:capacity=1"].prime_count, 1);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("grid.json");
    grid.save(&path).unwrap();

    let loaded = GridResults::load(&path).unwrap();
    assert_eq!(loaded.results.len(), grid.results.len());
    assert_eq!(loaded.summary.len(), grid.summary.len());
}

#[tokio::test]
async fn test_runner_rejects_invalid_config() {
    let mut config = ExperimentConfig::default();
    config.sieve.shard_capacity = 0;
    assert!(ExperimentRunner::new(config).is_err());
}
