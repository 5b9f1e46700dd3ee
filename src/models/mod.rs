//! Typed rows for raw and derived tables
//!
//! Raw rows mirror the generator's tables; derived rows are what the pipeline
//! writes back for the reporting layer.

pub mod derived;
pub mod raw;
pub mod types;

pub use derived::{DelayBinCount, EncounterFact, EventMetric, KpiMonthly, QualityCheck};
pub use raw::{Encounter, MedicationOrder, Patient, SafetyEvent, month_key};
pub use types::{
    AdmissionType, AgeBand, CheckStatus, DelayBin, EventType, MedClass, ServiceLine, Severity,
    Sex, UnknownVariant,
};
