//! Shared helpers for the pipeline and the command line tool

pub mod logging;

/// Ratio of two counts, defined as 0.0 when the denominator is zero
#[must_use]
pub fn safe_ratio(numerator: i64, denominator: i64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Convert a collection length into a table count column
#[must_use]
pub fn count_i64(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}
