//! Derivation steps of the metrics pipeline
//!
//! Each step is a pure function from typed rows to typed rows. Persisting the
//! results is left to [`crate::pipeline`].

pub mod events;
pub mod facts;
pub mod kpi;
pub mod quality;

pub use events::{build_delay_bins, build_event_metrics};
pub use facts::{apply_temporal_windows, build_encounter_facts};
pub use kpi::{KpiCounters, build_kpi_monthly_overall, build_kpi_monthly_service, event_encounter_ids};
pub use quality::{QualityInputs, build_audit_view, run_quality_checks};
