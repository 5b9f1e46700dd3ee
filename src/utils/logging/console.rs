//! Console output utilities
//!
//! This module provides formatted console output for the command line tool.

use crate::models::QualityCheck;

/// Print the data-quality report as an aligned list
pub fn print_quality_report(checks: &[QualityCheck]) {
    let width = checks.iter().map(|c| c.check.len()).max().unwrap_or(0);
    for check in checks {
        println!(
            "  {:<width$}  {}  {}",
            check.check,
            check.status,
            check.count,
            width = width
        );
    }
}
