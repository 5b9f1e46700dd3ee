//! Derived table rows
//!
//! Every derived table is rebuilt from scratch on each pipeline run.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::raw::{Encounter, month_key};
use crate::models::types::{AdmissionType, CheckStatus, DelayBin, EventType, ServiceLine};
use crate::utils::count_i64;

/// One row per encounter, enriched with medication, event and windowing flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterFact {
    pub encounter_id: String,
    pub patient_id: String,
    pub service_line: ServiceLine,
    pub admission_type: AdmissionType,
    pub admit_date: NaiveDate,
    pub discharge_date: NaiveDate,
    pub med_orders_count: i64,
    pub high_risk_exposure_flag: bool,
    pub adr_flag: bool,
    pub med_error_flag: bool,
    pub severe_event_flag: bool,
    pub reported_flag_any: bool,
    pub on_time_flag_any: bool,
    pub late_reporting_flag_any: bool,
    /// At least one safety event of any kind is linked to the encounter
    pub has_any_event: bool,
    pub length_of_stay_days: i64,
    pub readmission_30d_flag: bool,
    pub ed_revisit_7d_flag: bool,
}

impl EncounterFact {
    /// Start a fact row from an encounter with every derived field unset
    #[must_use]
    pub fn from_encounter(encounter: &Encounter) -> Self {
        Self {
            encounter_id: encounter.encounter_id.clone(),
            patient_id: encounter.patient_id.clone(),
            service_line: encounter.service_line,
            admission_type: encounter.admission_type,
            admit_date: encounter.admit_date,
            discharge_date: encounter.discharge_date,
            med_orders_count: 0,
            high_risk_exposure_flag: false,
            adr_flag: false,
            med_error_flag: false,
            severe_event_flag: false,
            reported_flag_any: false,
            on_time_flag_any: false,
            late_reporting_flag_any: false,
            has_any_event: false,
            length_of_stay_days: encounter.length_of_stay_days(),
            readmission_30d_flag: false,
            ed_revisit_7d_flag: false,
        }
    }

    /// Month of admission as `YYYY-MM`
    #[must_use]
    pub fn month(&self) -> String {
        month_key(self.admit_date)
    }

    /// Any adverse outcome: ADR, medication error or severe event
    #[must_use]
    pub const fn has_adverse_outcome(&self) -> bool {
        self.adr_flag || self.med_error_flag || self.severe_event_flag
    }
}

/// Monthly KPI summary, per service line or overall when `service_line` is `None`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiMonthly {
    pub month: String,
    pub service_line: Option<ServiceLine>,
    pub total_encounters: i64,
    pub encounters_with_event: i64,
    pub encounters_reported: i64,
    pub on_time_encounters: i64,
    pub compliance_rate: f64,
    pub timeliness_rate: f64,
    pub adr_count: i64,
    pub severe_count: i64,
    pub high_risk_exposure_count: i64,
    pub adr_per_1000: f64,
    pub severe_per_1000: f64,
    pub high_risk_exposure_rate: f64,
}

/// Event count per month, service line and event type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetric {
    pub month: String,
    pub service_line: ServiceLine,
    pub event_type: EventType,
    pub event_count: i64,
}

/// Event count per month, service line and reporting-delay bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayBinCount {
    pub month: String,
    pub service_line: ServiceLine,
    pub delay_bin: DelayBin,
    /// Position of the bucket in display order, starting at 0
    pub bin_order: i64,
    pub count: i64,
}

/// Result of one named data-quality check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityCheck {
    pub check: String,
    pub status: CheckStatus,
    pub count: i64,
}

impl QualityCheck {
    /// A check passes when it found no offending rows
    #[must_use]
    pub fn from_count(check: &str, count: usize) -> Self {
        let count = count_i64(count);
        Self {
            check: check.to_string(),
            status: if count == 0 {
                CheckStatus::Pass
            } else {
                CheckStatus::Fail
            },
            count,
        }
    }

    /// Whether the check passed
    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == CheckStatus::Pass
    }
}
