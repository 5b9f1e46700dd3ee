use crate::utils::{empty_store, event, sample_raw, store_with};
use clinops_metrics::models::{EventType, Severity};
use clinops_metrics::pipeline::verify_delivery;
use clinops_metrics::schema::{DERIVED_TABLES, ENCOUNTER_FACTS, RAW_TABLES};
use clinops_metrics::{PipelineConfig, run_full_pipeline};

/// Test that a fresh store reports every table as missing
#[test]
fn test_empty_store_is_incomplete() -> clinops_metrics::Result<()> {
    let fixture = empty_store();
    let report = verify_delivery(&fixture.store)?;

    assert!(report.present.is_empty());
    assert_eq!(report.missing.len(), RAW_TABLES.len() + DERIVED_TABLES.len());
    assert_eq!(report.duplicate_facts, None);
    assert!(!report.is_complete());
    Ok(())
}

/// Test that a clean run is a complete delivery
#[test]
fn test_clean_run_is_complete() -> clinops_metrics::Result<()> {
    let fixture = store_with(&sample_raw());
    let before = verify_delivery(&fixture.store)?;
    assert_eq!(before.missing.len(), DERIVED_TABLES.len());

    run_full_pipeline(&fixture.store, &PipelineConfig::default())?;
    let report = verify_delivery(&fixture.store)?;

    assert!(report.missing.is_empty());
    assert_eq!(report.duplicate_facts, Some(0));
    assert!(report.is_complete());
    let facts = report
        .present
        .iter()
        .find(|(table, _)| table == ENCOUNTER_FACTS)
        .map(|(_, rows)| *rows);
    assert_eq!(facts, Some(5));
    Ok(())
}

/// Test that a failed quality check makes the delivery incomplete
#[test]
fn test_failed_check_is_incomplete() -> clinops_metrics::Result<()> {
    let mut raw = sample_raw();
    raw.events
        .push(event("V9", "E-GHOST", EventType::Allergy, Severity::Mild, 0, true));
    let fixture = store_with(&raw);
    run_full_pipeline(&fixture.store, &PipelineConfig::default())?;

    let report = verify_delivery(&fixture.store)?;
    assert!(report.missing.is_empty());
    assert!(!report.is_complete());
    Ok(())
}
