//! Sieve Experiment: command-line harness for the sieve kernel.
//!
//! This crate runs the actor sieve and the fork/join reciprocal sum:
//! - Verifies pipeline counts against a sequential reference sieve
//! - Sweeps limits and shard capacities, recording chain length and timing
//! - Compares parallel and sequential reciprocal sums

pub mod config;
pub mod experiment;
pub mod results;
