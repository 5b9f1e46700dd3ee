use std::fs;
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Date32Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

use crate::utils::{derived_file_bytes, empty_store, sample_raw, store_with, write_raw};
use clinops_metrics::schema::{
    AUDIT_VIEW, DATA_QUALITY_REPORT, ENCOUNTER_FACTS, ENCOUNTERS, PATIENTS, SAFETY_EVENTS,
};
use clinops_metrics::{PipelineConfig, PipelineError, Patient, run_full_pipeline};

/// Test that a missing raw table fails the run and leaves the previous
/// outputs untouched
#[test]
fn test_missing_table_leaves_outputs_untouched() -> clinops_metrics::Result<()> {
    let fixture = store_with(&sample_raw());
    run_full_pipeline(&fixture.store, &PipelineConfig::default())?;
    let before = derived_file_bytes(&fixture.store);

    fs::remove_file(fixture.store.table_path(SAFETY_EVENTS))?;
    let err = run_full_pipeline(&fixture.store, &PipelineConfig::default()).unwrap_err();
    assert!(matches!(err, PipelineError::MissingTable { ref table } if table == SAFETY_EVENTS));

    assert_eq!(derived_file_bytes(&fixture.store), before);
    Ok(())
}

/// Test that empty patients or encounters are fatal and nothing is written
#[test]
fn test_empty_required_table_is_fatal() -> clinops_metrics::Result<()> {
    let mut raw = sample_raw();
    raw.encounters.clear();
    let fixture = store_with(&raw);

    let err = run_full_pipeline(&fixture.store, &PipelineConfig::default()).unwrap_err();
    assert!(matches!(err, PipelineError::EmptyTable { ref table } if table == ENCOUNTERS));
    assert!(derived_file_bytes(&fixture.store).is_empty());

    fixture.store.save_rows::<Patient>(PATIENTS, &[])?;
    let err = run_full_pipeline(&fixture.store, &PipelineConfig::default()).unwrap_err();
    assert!(matches!(err, PipelineError::EmptyTable { ref table } if table == PATIENTS));
    Ok(())
}

/// Test that empty optional tables still produce a full run
#[test]
fn test_empty_orders_and_events_are_accepted() -> clinops_metrics::Result<()> {
    let mut raw = sample_raw();
    raw.orders.clear();
    raw.events.clear();
    let fixture = store_with(&raw);

    let summary = run_full_pipeline(&fixture.store, &PipelineConfig::default())?;
    assert!(summary.quality_passed());
    assert_eq!(summary.rows("event_metrics_monthly"), Some(0));
    assert_eq!(summary.rows("reporting_delay_bins"), Some(0));
    Ok(())
}

fn events_with_text_delay() -> RecordBatch {
    let schema = Schema::new(vec![
        Field::new("event_id", DataType::Utf8, false),
        Field::new("encounter_id", DataType::Utf8, false),
        Field::new("event_type", DataType::Utf8, false),
        Field::new("severity", DataType::Utf8, false),
        Field::new("report_delay_days", DataType::Utf8, false),
        Field::new("reported_flag", DataType::Boolean, false),
        Field::new("event_date", DataType::Date32, false),
    ]);
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(vec!["V1"])),
        Arc::new(StringArray::from(vec!["E1"])),
        Arc::new(StringArray::from(vec!["ADR"])),
        Arc::new(StringArray::from(vec!["Mild"])),
        Arc::new(StringArray::from(vec!["three"])),
        Arc::new(BooleanArray::from(vec![true])),
        Arc::new(Date32Array::from(vec![19_723])),
    ];
    RecordBatch::try_new(Arc::new(schema), columns).unwrap()
}

/// Test that a column stored with the wrong type is a schema error
#[test]
fn test_schema_mismatch_is_reported() -> clinops_metrics::Result<()> {
    let fixture = store_with(&sample_raw());
    fixture
        .store
        .replace_table(SAFETY_EVENTS, &events_with_text_delay())?;

    let err = run_full_pipeline(&fixture.store, &PipelineConfig::default()).unwrap_err();
    match err {
        PipelineError::SchemaMismatch { table, details } => {
            assert_eq!(table, SAFETY_EVENTS);
            assert!(details.contains("report_delay_days"));
        }
        other => panic!("expected a schema mismatch, got {other}"),
    }
    assert!(derived_file_bytes(&fixture.store).is_empty());
    Ok(())
}

/// Test that a stored category outside its enumeration fails the load
#[test]
fn test_unknown_category_is_rejected() -> clinops_metrics::Result<()> {
    let fixture = empty_store();
    write_raw(&fixture.store, &sample_raw())?;

    let mut batch = events_with_text_delay();
    let delay: ArrayRef = Arc::new(arrow::array::Int64Array::from(vec![1]));
    let kind: ArrayRef = Arc::new(StringArray::from(vec!["Fall"]));
    let mut columns = batch.columns().to_vec();
    columns[2] = kind;
    columns[4] = delay;
    let fields: Vec<Field> = batch
        .schema()
        .fields()
        .iter()
        .map(|f| {
            if f.name() == "report_delay_days" {
                Field::new(f.name(), DataType::Int64, false)
            } else {
                f.as_ref().clone()
            }
        })
        .collect();
    batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?;
    fixture.store.replace_table(SAFETY_EVENTS, &batch)?;

    let err = run_full_pipeline(&fixture.store, &PipelineConfig::default()).unwrap_err();
    assert!(matches!(err, PipelineError::Serde { ref table, .. } if table == SAFETY_EVENTS));
    assert!(err.to_string().contains("Fall"));
    Ok(())
}

/// Test that a negative reporting delay is a value error
#[test]
fn test_negative_delay_is_rejected() {
    let mut raw = sample_raw();
    raw.events[1].report_delay_days = -3;
    let fixture = store_with(&raw);

    let err = run_full_pipeline(&fixture.store, &PipelineConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::InvalidValue { ref table, ref column, .. }
            if table == SAFETY_EVENTS && column == "report_delay_days"
    ));
}

/// Test that a commit failing partway leaves no staging files behind
#[test]
fn test_failed_commit_leaves_no_staging_files() -> clinops_metrics::Result<()> {
    let fixture = store_with(&sample_raw());
    fs::create_dir(fixture.store.table_path(AUDIT_VIEW))?;

    let err = run_full_pipeline(&fixture.store, &PipelineConfig::default()).unwrap_err();
    assert!(matches!(err, PipelineError::Io(_)));

    let staging = fs::read_dir(fixture.dir.path())?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(".staging"))
        .count();
    assert_eq!(staging, 0);
    // Tables ahead of the failure were committed, the rest were not
    assert!(fixture.store.contains(ENCOUNTER_FACTS));
    assert!(!fixture.store.contains(AUDIT_VIEW));
    assert!(!fixture.store.contains(DATA_QUALITY_REPORT));
    Ok(())
}
