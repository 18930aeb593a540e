//! Fork/join reciprocal sum over a slice.
//!
//! A range longer than the sequential threshold is cut into `task_count`
//! contiguous chunks. All but the last chunk are forked onto the pool, the
//! last is summed on the current worker, then the forks are joined and their
//! partial sums added. Chunks recurse with the same rule.
//!
//! Addition order depends on the split, so results for different task
//! counts may differ in the last bits.

use std::ops::Range;

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::config::ReductionConfig;
use crate::error::{Result, SieveError};

/// Sequential sum of `1 / x` over `input`, left to right.
pub fn seq_reciprocal_sum(input: &[f64]) -> f64 {
    input.iter().fold(0.0, |sum, x| sum + 1.0 / x)
}

/// Size of each chunk when `n_elements` are split into `n_chunks` (ceiling).
pub fn chunk_size(n_chunks: usize, n_elements: usize) -> usize {
    n_elements.div_ceil(n_chunks.max(1))
}

/// Inclusive start index of `chunk`, clamped to `n_elements`.
pub fn chunk_start_inclusive(chunk: usize, n_chunks: usize, n_elements: usize) -> usize {
    (chunk * chunk_size(n_chunks, n_elements)).min(n_elements)
}

/// Exclusive end index of `chunk`, clamped to `n_elements`.
pub fn chunk_end_exclusive(chunk: usize, n_chunks: usize, n_elements: usize) -> usize {
    ((chunk + 1) * chunk_size(n_chunks, n_elements)).min(n_elements)
}

/// The `n_chunks` contiguous ranges covering `0..n_elements`.
///
/// Trailing chunks are empty when there are more chunks than elements.
pub fn chunk_ranges(n_chunks: usize, n_elements: usize) -> impl Iterator<Item = Range<usize>> {
    (0..n_chunks).map(move |chunk| {
        chunk_start_inclusive(chunk, n_chunks, n_elements)
            ..chunk_end_exclusive(chunk, n_chunks, n_elements)
    })
}

/// Reciprocal sum on an owned fork/join pool.
pub struct ReciprocalSum {
    pool: ThreadPool,
    config: ReductionConfig,
}

impl std::fmt::Debug for ReciprocalSum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReciprocalSum")
            .field("config", &self.config)
            .field("threads", &self.pool.current_num_threads())
            .finish()
    }
}

impl ReciprocalSum {
    /// Build the pool described by `config`.
    pub fn new(config: ReductionConfig) -> Result<Self> {
        config.validate()?;

        let mut builder =
            ThreadPoolBuilder::new().thread_name(|index| format!("reciprocal-{index}"));
        if let Some(threads) = config.worker_threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder
            .build()
            .map_err(|e| SieveError::Runtime(format!("failed to build pool: {e}")))?;

        debug!(
            threads = pool.current_num_threads(),
            threshold = config.sequential_threshold,
            "ReciprocalSum pool ready"
        );
        Ok(Self { pool, config })
    }

    /// Configuration the pool was built with.
    pub fn config(&self) -> &ReductionConfig {
        &self.config
    }

    /// Sum of reciprocals of `input`, split into `task_count` chunks per level.
    ///
    /// `task_count == 1` never splits and matches [`seq_reciprocal_sum`]
    /// exactly.
    pub fn sum(&self, input: &[f64], task_count: usize) -> Result<f64> {
        if task_count == 0 {
            return Err(SieveError::InvalidTaskCount(task_count));
        }
        if task_count == 1 {
            return Ok(seq_reciprocal_sum(input));
        }

        let threshold = self.config.sequential_threshold;
        Ok(self
            .pool
            .install(|| sum_range(input, task_count, threshold)))
    }

    /// Sum using the configured task count.
    pub fn sum_configured(&self, input: &[f64]) -> Result<f64> {
        self.sum(input, self.config.task_count)
    }

    /// Two-way split.
    pub fn sum_two_tasks(&self, input: &[f64]) -> Result<f64> {
        self.sum(input, 2)
    }

    /// Tear down the pool. Worker threads exit once idle.
    pub fn shutdown(self) {
        debug!("ReciprocalSum pool shutting down");
        drop(self.pool);
    }
}

fn sum_range(slice: &[f64], task_count: usize, threshold: usize) -> f64 {
    if slice.len() <= threshold {
        return seq_reciprocal_sum(slice);
    }

    let ranges: Vec<Range<usize>> = chunk_ranges(task_count, slice.len()).collect();
    let Some((last, forked)) = ranges.split_last() else {
        return seq_reciprocal_sum(slice);
    };

    let mut partials = vec![0.0; forked.len()];
    let tail = rayon::scope(|s| {
        for (partial, range) in partials.iter_mut().zip(forked) {
            let chunk = &slice[range.clone()];
            s.spawn(move |_| *partial = sum_range(chunk, task_count, threshold));
        }
        sum_range(&slice[last.clone()], task_count, threshold)
    });

    partials.iter().fold(tail, |sum, partial| sum + partial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pool(threshold: usize) -> ReciprocalSum {
        ReciprocalSum::new(ReductionConfig {
            sequential_threshold: threshold,
            task_count: 4,
            worker_threads: Some(4),
        })
        .unwrap()
    }

    fn sample(len: usize) -> Vec<f64> {
        (0..len).map(|i| 0.1 + (i % 9) as f64 * 0.1).collect()
    }

    #[test]
    fn test_chunk_helpers_uneven_split() {
        // 10 elements into 4 chunks of ceil(10 / 4) = 3
        assert_eq!(chunk_size(4, 10), 3);
        let ranges: Vec<_> = chunk_ranges(4, 10).collect();
        assert_eq!(ranges, vec![0..3, 3..6, 6..9, 9..10]);
    }

    #[test]
    fn test_more_chunks_than_elements() {
        let ranges: Vec<_> = chunk_ranges(4, 5).collect();
        assert_eq!(ranges, vec![0..2, 2..4, 4..5, 5..5]);
    }

    #[test]
    fn test_single_task_is_exactly_sequential() {
        let sum = pool(1);
        let input = sample(20_000);
        assert_eq!(sum.sum(&input, 1).unwrap(), seq_reciprocal_sum(&input));
    }

    #[test]
    fn test_zero_tasks_rejected() {
        let sum = pool(10);
        assert_eq!(
            sum.sum(&[1.0, 2.0], 0),
            Err(SieveError::InvalidTaskCount(0))
        );
    }

    #[test]
    fn test_empty_input_sums_to_zero() {
        let sum = pool(10);
        assert_eq!(sum.sum(&[], 4).unwrap(), 0.0);
    }

    #[test]
    fn test_small_known_sum() {
        let sum = pool(2);
        let input = [0.5, 0.25, 1.0, 2.0, 4.0];
        // 2 + 4 + 1 + 0.5 + 0.25, all exact in binary
        assert_eq!(sum.sum(&input, 3).unwrap(), 7.75);
        assert_eq!(sum.sum_two_tasks(&input).unwrap(), 7.75);
    }

    #[test]
    fn test_many_tasks_close_to_sequential() {
        let sum = pool(64);
        let input = sample(100_003);
        let expected = seq_reciprocal_sum(&input);
        for tasks in [2, 3, 4, 7, 16] {
            let got = sum.sum(&input, tasks).unwrap();
            assert!(
                (got - expected).abs() <= expected.abs() * 1e-12,
                "tasks={tasks} got={got} expected={expected}"
            );
        }
    }

    proptest! {
        #[test]
        fn prop_chunks_cover_range_disjointly(n_elements in 0usize..5_000, n_chunks in 1usize..64) {
            let ranges: Vec<_> = chunk_ranges(n_chunks, n_elements).collect();
            prop_assert_eq!(ranges.len(), n_chunks);

            let mut expected_start = 0;
            for range in &ranges {
                prop_assert_eq!(range.start, expected_start);
                prop_assert!(range.start <= range.end);
                expected_start = range.end;
            }
            prop_assert_eq!(expected_start, n_elements);
        }

        #[test]
        fn prop_parallel_sum_within_tolerance(
            input in prop::collection::vec(0.01f64..100.0, 0..2_000),
            tasks in 1usize..9,
        ) {
            let sum = pool(16);
            let expected = seq_reciprocal_sum(&input);
            let got = sum.sum(&input, tasks).unwrap();
            prop_assert!((got - expected).abs() <= expected.abs() * 1e-9 + 1e-12);
        }
    }
}
