//! Raw entity rows
//!
//! These rows are produced by the external data generator and are read-only
//! for the pipeline.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::types::{
    AdmissionType, AgeBand, EventType, MedClass, ServiceLine, Severity, Sex,
};

/// A patient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub patient_id: String,
    pub age_band: AgeBand,
    pub sex: Sex,
}

/// A single hospital stay or visit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encounter {
    pub encounter_id: String,
    pub patient_id: String,
    pub service_line: ServiceLine,
    pub admission_type: AdmissionType,
    pub admit_date: NaiveDate,
    pub discharge_date: NaiveDate,
}

impl Encounter {
    /// Whole days between admission and discharge. Negative when the source
    /// data records a discharge before the admission.
    #[must_use]
    pub fn length_of_stay_days(&self) -> i64 {
        (self.discharge_date - self.admit_date).num_days()
    }
}

/// Format a date as its `YYYY-MM` reporting month
#[must_use]
pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// A medication order placed during an encounter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationOrder {
    pub med_order_id: String,
    pub encounter_id: String,
    pub med_class: MedClass,
    pub high_risk_flag: bool,
    pub order_date: NaiveDate,
}

/// A medication safety event linked to an encounter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyEvent {
    pub event_id: String,
    pub encounter_id: String,
    pub event_type: EventType,
    pub severity: Severity,
    pub report_delay_days: i64,
    pub reported_flag: bool,
    pub event_date: NaiveDate,
}

impl SafetyEvent {
    /// Reported within `threshold_days` of the event
    #[must_use]
    pub const fn is_reported_on_time(&self, threshold_days: i64) -> bool {
        self.reported_flag && self.report_delay_days <= threshold_days
    }

    /// Reported, but after `threshold_days`
    #[must_use]
    pub const fn is_reported_late(&self, threshold_days: i64) -> bool {
        self.reported_flag && self.report_delay_days > threshold_days
    }
}
