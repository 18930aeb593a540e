//! Integration tests for the actor sieve pipeline.
//!
//! Every run is checked against the sequential reference sieve, then against
//! the chain properties:
//! - one actor per `capacity` primes (rounded up)
//! - no prime held by two shards
//! - repeated and independent runs agree
//!
//! Every run is bounded by a timeout so a pipeline that never goes quiet
//! fails instead of hanging.

use std::collections::HashSet;
use std::future::Future;

use tokio::time::{timeout, Duration};

use sieve_kernel::{
    count_primes_sequential, primes_sequential, SieveConfig, SieveError, SieveReport, SieveRuntime,
};

/// Upper bound for any single run in these tests.
const RUN_TIMEOUT: Duration = Duration::from_secs(120);

/// Upper bound for the long-chain run.
const LONG_CHAIN_TIMEOUT: Duration = Duration::from_secs(600);

async fn runtime(capacity: usize) -> SieveRuntime {
    SieveRuntime::launch(SieveConfig::with_capacity(capacity))
        .await
        .expect("runtime should launch")
}

async fn bounded<T>(what: &str, future: impl Future<Output = T>) -> T {
    timeout(RUN_TIMEOUT, future)
        .await
        .unwrap_or_else(|_| panic!("{what} did not finish within {RUN_TIMEOUT:?}"))
}

async fn count(sieve: &mut SieveRuntime, limit: i64) -> usize {
    bounded(&format!("count_primes({limit})"), sieve.count_primes(limit))
        .await
        .unwrap()
}

async fn run(sieve: &mut SieveRuntime, limit: i64) -> SieveReport {
    bounded(&format!("run({limit})"), sieve.run(limit))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_small_limits() {
    let mut sieve = runtime(4).await;

    assert_eq!(count(&mut sieve, 0).await, 0);
    assert_eq!(count(&mut sieve, 1).await, 0);
    assert_eq!(count(&mut sieve, 2).await, 1);
    assert_eq!(count(&mut sieve, 3).await, 2);
    assert_eq!(count(&mut sieve, 30).await, 10);

    sieve.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_matches_reference_across_capacities() {
    for capacity in [1, 2, 7, 100, 1_000] {
        let mut sieve = runtime(capacity).await;
        for limit in [10u64, 97, 1_000, 2_003] {
            let got = count(&mut sieve, limit as i64).await;
            assert_eq!(
                got,
                count_primes_sequential(limit),
                "capacity={capacity} limit={limit}"
            );
        }
        sieve.shutdown().await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_chain_length_tracks_capacity() {
    for capacity in [3, 10, 64, 1_000] {
        let mut sieve = runtime(capacity).await;
        let report = run(&mut sieve, 20_000).await;

        assert_eq!(report.prime_count, 2_262);
        assert_eq!(report.actor_count, report.prime_count.div_ceil(capacity));
        assert_eq!(report.shard_sizes.len(), report.actor_count);
        assert_eq!(report.shard_capacity, capacity);

        // Every shard but the tail is full.
        let (tail, full) = report.shard_sizes.split_last().unwrap();
        assert!(full.iter().all(|&size| size == capacity));
        assert!(*tail >= 1 && *tail <= capacity);

        sieve.shutdown().await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_one_prime_per_shard_long_chain() {
    let mut sieve = runtime(1).await;

    // pi(12_600) = 1_504, one actor each.
    let report = timeout(LONG_CHAIN_TIMEOUT, sieve.run(12_600))
        .await
        .expect("a long chain must still reach quiescence")
        .unwrap();

    assert_eq!(report.prime_count, count_primes_sequential(12_600));
    assert_eq!(report.prime_count, 1_504);
    assert_eq!(report.actor_count, 1_504);
    assert!(report.shard_sizes.iter().all(|&size| size == 1));

    sieve.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shards_are_disjoint_and_ordered() {
    let mut sieve = runtime(25).await;
    let primes = bounded("collect_primes(5000)", sieve.collect_primes(5_000))
        .await
        .unwrap();

    let unique: HashSet<u64> = primes.iter().copied().collect();
    assert_eq!(unique.len(), primes.len(), "a prime appeared in two shards");
    assert!(primes.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(primes, primes_sequential(5_000));

    sieve.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_repeated_runs_are_idempotent() {
    let mut sieve = runtime(16).await;
    let first = run(&mut sieve, 3_000).await;
    let second = run(&mut sieve, 3_000).await;

    assert_eq!(first.prime_count, second.prime_count);
    assert_eq!(first.shard_sizes, second.shard_sizes);
    sieve.shutdown().await.unwrap();

    let mut independent = runtime(16).await;
    assert_eq!(count(&mut independent, 3_000).await, first.prime_count);
    independent.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_negative_limit_is_an_input_error() {
    let mut sieve = runtime(16).await;
    assert_eq!(
        sieve.count_primes(-1).await,
        Err(SieveError::NegativeLimit(-1))
    );
    // The runtime is still usable afterwards.
    assert_eq!(count(&mut sieve, 10).await, 4);
    sieve.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shutdown_after_many_shards_completes() {
    let mut sieve = runtime(2).await;
    for _ in 0..3 {
        assert_eq!(count(&mut sieve, 1_000).await, 168);
    }
    timeout(RUN_TIMEOUT, sieve.shutdown())
        .await
        .expect("shutdown should reach every shard")
        .unwrap();
}
