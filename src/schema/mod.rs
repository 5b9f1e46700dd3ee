//! Table names, declared Arrow schemas and schema compatibility checks.
//!
//! Every table the pipeline reads or writes has a declared schema. Stored
//! files are checked against it before any row is deserialized, so a column
//! with the wrong type fails with a precise message instead of being coerced.

use arrow::datatypes::{DataType, Schema};

use crate::error::{PipelineError, Result};

pub mod definitions;

pub use definitions::ArrowSchema;

/// Raw patient table
pub const PATIENTS: &str = "patients";
/// Raw encounter table
pub const ENCOUNTERS: &str = "encounters";
/// Raw medication order table
pub const MED_ORDERS: &str = "med_orders";
/// Raw safety event table
pub const SAFETY_EVENTS: &str = "safety_events";

/// One row per encounter with derived flags
pub const ENCOUNTER_FACTS: &str = "encounter_facts";
/// Monthly KPIs per service line
pub const KPI_MONTHLY_SERVICE: &str = "kpi_monthly_service";
/// Monthly KPIs across all service lines
pub const KPI_MONTHLY_OVERALL: &str = "kpi_monthly_overall";
/// Monthly event counts per service line and event type
pub const EVENT_METRICS_MONTHLY: &str = "event_metrics_monthly";
/// Monthly event counts per service line and reporting-delay bucket
pub const REPORTING_DELAY_BINS: &str = "reporting_delay_bins";
/// Encounters needing priority review
pub const AUDIT_VIEW: &str = "audit_view";
/// Outcome of the data-quality checks
pub const DATA_QUALITY_REPORT: &str = "data_quality_report";

/// Tables written by the external generator
pub const RAW_TABLES: [&str; 4] = [PATIENTS, ENCOUNTERS, MED_ORDERS, SAFETY_EVENTS];

/// Tables rebuilt on every pipeline run
pub const DERIVED_TABLES: [&str; 7] = [
    ENCOUNTER_FACTS,
    KPI_MONTHLY_SERVICE,
    KPI_MONTHLY_OVERALL,
    EVENT_METRICS_MONTHLY,
    REPORTING_DELAY_BINS,
    AUDIT_VIEW,
    DATA_QUALITY_REPORT,
];

/// A struct that represents the compatibility of a stored table with its declared schema
#[derive(Debug)]
pub struct SchemaCompatibilityReport {
    /// Whether the stored schema can be read as the declared one
    pub compatible: bool,
    /// List of incompatibility issues, if any
    pub issues: Vec<SchemaIssue>,
}

impl SchemaCompatibilityReport {
    /// Join all issue descriptions into one line
    #[must_use]
    pub fn describe(&self) -> String {
        self.issues
            .iter()
            .map(|issue| issue.description.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// A schema compatibility issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIssue {
    /// The column the issue concerns
    pub column: String,
    /// Description of the incompatibility
    pub description: String,
}

/// Compare a stored schema against the declared one.
///
/// Every declared column must be present with the declared data type.
/// Additional stored columns are tolerated and ignored on read.
#[must_use]
pub fn find_schema_incompatibilities(expected: &Schema, actual: &Schema) -> Vec<SchemaIssue> {
    let mut issues = Vec::new();

    for field in expected.fields() {
        match actual.field_with_name(field.name()) {
            Err(_) => issues.push(SchemaIssue {
                column: field.name().clone(),
                description: format!("missing column '{}'", field.name()),
            }),
            Ok(stored) if !types_compatible(field.data_type(), stored.data_type()) => {
                issues.push(SchemaIssue {
                    column: field.name().clone(),
                    description: format!(
                        "column '{}' has type {} but {} is required",
                        field.name(),
                        stored.data_type(),
                        field.data_type()
                    ),
                });
            }
            Ok(_) => {}
        }
    }

    issues
}

/// Checks if a stored column type can be read as the declared type
#[must_use]
pub fn types_compatible(expected: &DataType, actual: &DataType) -> bool {
    expected == actual
}

/// Build a compatibility report for a stored table
#[must_use]
pub fn check_schema(expected: &Schema, actual: &Schema) -> SchemaCompatibilityReport {
    let issues = find_schema_incompatibilities(expected, actual);
    SchemaCompatibilityReport {
        compatible: issues.is_empty(),
        issues,
    }
}

/// Fail with a `SchemaMismatch` naming every issue when a stored table does
/// not match its declared schema
pub fn validate_schema(table: &str, expected: &Schema, actual: &Schema) -> Result<()> {
    let report = check_schema(expected, actual);
    if report.compatible {
        return Ok(());
    }
    Err(PipelineError::SchemaMismatch {
        table: table.to_string(),
        details: report.describe(),
    })
}
