//! Logging utilities
//!
//! This module provides standardized logging functions for table operations.

use std::path::Path;
use std::time::Duration;

/// Log an operation start with consistent format
///
/// # Arguments
/// * `operation` - Description of the operation
/// * `path` - Path of the table file being operated on
pub fn log_operation_start(operation: &str, path: &Path) {
    log::debug!("{} {}", operation, path.display());
}

/// Log an operation completion with consistent format
///
/// # Arguments
/// * `operation` - Description of the operation
/// * `path` - Path of the table file that was operated on
/// * `rows` - Number of rows processed
/// * `elapsed` - Optional elapsed time
pub fn log_operation_complete(operation: &str, path: &Path, rows: usize, elapsed: Option<Duration>) {
    if let Some(duration) = elapsed {
        log::debug!(
            "Successfully {} {} rows from {} in {:?}",
            operation,
            rows,
            path.display(),
            duration
        );
    } else {
        log::debug!("Successfully {} {} rows from {}", operation, rows, path.display());
    }
}

/// Log the completion of a pipeline stage
///
/// # Arguments
/// * `stage` - Name of the pipeline stage
/// * `table` - Derived table the stage produced
/// * `rows` - Number of rows in the derived table
/// * `elapsed` - Time spent in the stage
pub fn log_stage_complete(stage: &str, table: &str, rows: usize, elapsed: Duration) {
    log::info!("{stage}: {table} built with {rows} rows in {elapsed:?}");
}

/// Log a warning, optionally tied to a table
///
/// # Arguments
/// * `message` - Warning message
/// * `table` - Optional table related to the warning
pub fn log_warning(message: &str, table: Option<&str>) {
    if let Some(table) = table {
        log::warn!("{table}: {message}");
    } else {
        log::warn!("{message}");
    }
}
