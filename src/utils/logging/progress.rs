//! Progress reporting for pipeline runs
//!
//! This module provides progress reporting over pipeline stages, using the
//! indicatif crate.

use indicatif::{ProgressBar, ProgressStyle};

/// Default style for the stage progress bar
pub const DEFAULT_STAGE_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// Create a progress bar counting pipeline stages
///
/// # Arguments
/// * `stages` - Number of stages in the run
/// * `description` - Optional description to display as the initial message
///
/// # Returns
/// A configured `ProgressBar`
#[must_use]
pub fn create_stage_progress_bar(stages: u64, description: Option<&str>) -> ProgressBar {
    let pb = ProgressBar::new(stages);
    let style = ProgressStyle::default_bar()
        .template(DEFAULT_STAGE_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);

    if let Some(desc) = description {
        pb.set_message(desc.to_string());
    }

    pb
}

/// Finish a progress bar with a completion message
///
/// # Arguments
/// * `pb` - The `ProgressBar` to finish
/// * `message` - Optional completion message
pub fn finish_progress_bar(pb: &ProgressBar, message: Option<&str>) {
    if let Some(msg) = message {
        pb.finish_with_message(msg.to_string());
    } else {
        pb.finish();
    }
}
