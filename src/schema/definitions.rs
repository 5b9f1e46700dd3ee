//! Declared Arrow schemas for every row type
//!
//! Rows are converted with `serde_arrow` against these schemas rather than
//! schemas traced from samples, so an empty table still has its full column set.

use arrow::datatypes::{DataType, Field, FieldRef, Schema};
use arrow::record_batch::RecordBatch;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{PipelineError, Result};
use crate::models::{
    DelayBinCount, Encounter, EncounterFact, EventMetric, KpiMonthly, MedicationOrder, Patient,
    QualityCheck, SafetyEvent,
};
use crate::schema::validate_schema;

/// A row type with a declared Arrow schema
pub trait ArrowSchema: Serialize + DeserializeOwned + Sized {
    /// The declared schema for this row type
    fn schema() -> Schema;

    /// Deserialize rows from a stored batch after validating its schema
    fn from_record_batch(table: &str, batch: &RecordBatch) -> Result<Vec<Self>> {
        let declared = Self::schema();
        validate_schema(table, &declared, batch.schema().as_ref())?;

        let stored = batch.schema();
        let indices = declared
            .fields()
            .iter()
            .map(|field| stored.index_of(field.name()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let projected = batch.project(&indices)?;

        serde_arrow::from_record_batch::<Vec<Self>>(&projected)
            .map_err(|e| PipelineError::serde(table, e))
    }

    /// Serialize rows into a batch carrying the declared schema
    fn to_record_batch(table: &str, rows: &[Self]) -> Result<RecordBatch> {
        let fields: Vec<FieldRef> = Self::schema().fields().iter().cloned().collect();
        serde_arrow::to_record_batch(&fields, &rows).map_err(|e| PipelineError::serde(table, e))
    }
}

fn utf8(name: &str) -> Field {
    Field::new(name, DataType::Utf8, false)
}

fn date(name: &str) -> Field {
    Field::new(name, DataType::Date32, false)
}

fn int(name: &str) -> Field {
    Field::new(name, DataType::Int64, false)
}

fn flag(name: &str) -> Field {
    Field::new(name, DataType::Boolean, false)
}

fn rate(name: &str) -> Field {
    Field::new(name, DataType::Float64, false)
}

impl ArrowSchema for Patient {
    fn schema() -> Schema {
        Schema::new(vec![utf8("patient_id"), utf8("age_band"), utf8("sex")])
    }
}

impl ArrowSchema for Encounter {
    fn schema() -> Schema {
        Schema::new(vec![
            utf8("encounter_id"),
            utf8("patient_id"),
            utf8("service_line"),
            utf8("admission_type"),
            date("admit_date"),
            date("discharge_date"),
        ])
    }
}

impl ArrowSchema for MedicationOrder {
    fn schema() -> Schema {
        Schema::new(vec![
            utf8("med_order_id"),
            utf8("encounter_id"),
            utf8("med_class"),
            flag("high_risk_flag"),
            date("order_date"),
        ])
    }
}

impl ArrowSchema for SafetyEvent {
    fn schema() -> Schema {
        Schema::new(vec![
            utf8("event_id"),
            utf8("encounter_id"),
            utf8("event_type"),
            utf8("severity"),
            int("report_delay_days"),
            flag("reported_flag"),
            date("event_date"),
        ])
    }
}

impl ArrowSchema for EncounterFact {
    fn schema() -> Schema {
        Schema::new(vec![
            utf8("encounter_id"),
            utf8("patient_id"),
            utf8("service_line"),
            utf8("admission_type"),
            date("admit_date"),
            date("discharge_date"),
            int("med_orders_count"),
            flag("high_risk_exposure_flag"),
            flag("adr_flag"),
            flag("med_error_flag"),
            flag("severe_event_flag"),
            flag("reported_flag_any"),
            flag("on_time_flag_any"),
            flag("late_reporting_flag_any"),
            flag("has_any_event"),
            int("length_of_stay_days"),
            flag("readmission_30d_flag"),
            flag("ed_revisit_7d_flag"),
        ])
    }
}

impl ArrowSchema for KpiMonthly {
    fn schema() -> Schema {
        Schema::new(vec![
            utf8("month"),
            // Null in the overall table
            Field::new("service_line", DataType::Utf8, true),
            int("total_encounters"),
            int("encounters_with_event"),
            int("encounters_reported"),
            int("on_time_encounters"),
            rate("compliance_rate"),
            rate("timeliness_rate"),
            int("adr_count"),
            int("severe_count"),
            int("high_risk_exposure_count"),
            rate("adr_per_1000"),
            rate("severe_per_1000"),
            rate("high_risk_exposure_rate"),
        ])
    }
}

impl ArrowSchema for EventMetric {
    fn schema() -> Schema {
        Schema::new(vec![
            utf8("month"),
            utf8("service_line"),
            utf8("event_type"),
            int("event_count"),
        ])
    }
}

impl ArrowSchema for DelayBinCount {
    fn schema() -> Schema {
        Schema::new(vec![
            utf8("month"),
            utf8("service_line"),
            utf8("delay_bin"),
            int("bin_order"),
            int("count"),
        ])
    }
}

impl ArrowSchema for QualityCheck {
    fn schema() -> Schema {
        Schema::new(vec![utf8("check"), utf8("status"), int("count")])
    }
}
