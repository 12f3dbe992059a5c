//! Streaming statistics for Monte Carlo repetitions
//!
//! Repetition outcomes are consumed one at a time, so everything here is
//! single-pass (Welford's update) and never stores the samples.

mod summary;

pub use summary::SummaryStats;

/// Mean of a slice, `None` when empty
#[inline]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Relative shortfall `1 - value / reference`
///
/// `None` when the reference is too close to zero for the ratio to mean anything.
#[inline]
pub fn relative_loss(value: f64, reference: f64) -> Option<f64> {
    if reference.abs() < f64::EPSILON {
        return None;
    }
    Some(1.0 - value / reference)
}
