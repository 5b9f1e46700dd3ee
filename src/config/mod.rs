//! Configuration for the metrics pipeline.

use std::fmt;

/// Environment variable overriding the on-time reporting threshold
pub const ON_TIME_DAYS_ENV: &str = "CLINOPS_ON_TIME_DAYS";
/// Environment variable overriding the readmission window
pub const READMISSION_DAYS_ENV: &str = "CLINOPS_READMISSION_DAYS";
/// Environment variable overriding the ED revisit window
pub const ED_REVISIT_DAYS_ENV: &str = "CLINOPS_ED_REVISIT_DAYS";

/// Thresholds used when deriving encounter facts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Events reported within this many days count as on time
    pub on_time_threshold_days: i64,
    /// Maximum gap between discharge and next admission for a readmission
    pub readmission_window_days: i64,
    /// Maximum gap between discharge and next ED admission for a revisit
    pub ed_revisit_window_days: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            on_time_threshold_days: 7,
            readmission_window_days: 30,
            ed_revisit_window_days: 7,
        }
    }
}

impl PipelineConfig {
    /// Build a configuration from the defaults, overridden by any
    /// environment variables that parse as non-negative integers
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            on_time_threshold_days: env_days(ON_TIME_DAYS_ENV)
                .unwrap_or(defaults.on_time_threshold_days),
            readmission_window_days: env_days(READMISSION_DAYS_ENV)
                .unwrap_or(defaults.readmission_window_days),
            ed_revisit_window_days: env_days(ED_REVISIT_DAYS_ENV)
                .unwrap_or(defaults.ed_revisit_window_days),
        }
    }
}

fn env_days(key: &str) -> Option<i64> {
    let raw = std::env::var(key).ok()?;
    match raw.parse::<i64>() {
        Ok(days) if days >= 0 => Some(days),
        _ => {
            log::warn!("Ignoring {key}={raw}: expected a non-negative number of days");
            None
        }
    }
}

impl fmt::Display for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pipeline Configuration:")?;
        writeln!(f, "  On-Time Threshold: {} days", self.on_time_threshold_days)?;
        writeln!(f, "  Readmission Window: {} days", self.readmission_window_days)?;
        writeln!(f, "  ED Revisit Window: {} days", self.ed_revisit_window_days)
    }
}
