//! Monte Carlo Aggregator
//!
//! Sweeps population sizes, drawing `repetitions` populations per size and
//! evaluating every available mechanism over the same draw.
//!
//! # Architecture
//!
//! - Menu and centralized allocation are solved once, before the sweep
//! - A mechanism whose optimizer failed is skipped, never zero-filled
//! - Every repetition gets its own RNG seeded from `(seed, N, rep)`, so the
//!   sequential and parallel sweeps produce identical numbers
//!
//! # Runners
//!
//! - [`MonteCarloRunner::run`]: sequential, or one scoped thread per
//!   population size when `parallel` is set

mod runner;

pub use runner::{MonteCarloConfig, MonteCarloRunner, RunSummary, SweepResults, repetition_seed};
