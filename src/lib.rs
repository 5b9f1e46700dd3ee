//! Medication safety and operational quality metrics over hospital tables.
//!
//! Raw patients, encounters, medication orders and safety events are read
//! from a directory of Parquet tables and turned into encounter facts,
//! monthly KPIs, event metrics, an audit worklist and a data-quality report.

pub mod algorithm;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod schema;
pub mod store;
pub mod utils;

// Re-export the most common types for easier use
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use pipeline::{PipelineSummary, run_full_pipeline};
pub use schema::{ArrowSchema, SchemaCompatibilityReport, SchemaIssue};
pub use store::TableStore;

// Row types
pub use models::{
    DelayBinCount, Encounter, EncounterFact, EventMetric, KpiMonthly, MedicationOrder, Patient,
    QualityCheck, SafetyEvent,
};

// Arrow types
pub use arrow::record_batch::RecordBatch;
