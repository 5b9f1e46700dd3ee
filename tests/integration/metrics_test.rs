use crate::utils::{date, encounter, event, patient, sample_raw, store_with};
use clinops_metrics::models::{AdmissionType, CheckStatus, EventType, ServiceLine, Severity};
use clinops_metrics::schema::{
    AUDIT_VIEW, DATA_QUALITY_REPORT, EVENT_METRICS_MONTHLY, KPI_MONTHLY_OVERALL,
    KPI_MONTHLY_SERVICE, REPORTING_DELAY_BINS,
};
use clinops_metrics::{
    DelayBinCount, EncounterFact, EventMetric, KpiMonthly, PipelineConfig, QualityCheck,
    run_full_pipeline,
};

fn close(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() < 1e-9
}

/// Test the monthly KPIs per service line
#[test]
fn test_kpi_monthly_service() -> clinops_metrics::Result<()> {
    let fixture = store_with(&sample_raw());
    run_full_pipeline(&fixture.store, &PipelineConfig::default())?;
    let rows: Vec<KpiMonthly> = fixture.store.load_rows(KPI_MONTHLY_SERVICE)?;

    let keys: Vec<(&str, Option<ServiceLine>)> =
        rows.iter().map(|r| (r.month.as_str(), r.service_line)).collect();
    assert_eq!(
        keys,
        [
            ("2024-01", Some(ServiceLine::Medicine)),
            ("2024-02", Some(ServiceLine::Surgery)),
            ("2024-02", Some(ServiceLine::Icu)),
            ("2024-03", Some(ServiceLine::Surgery)),
        ]
    );

    let medicine = &rows[0];
    assert_eq!(medicine.total_encounters, 2);
    assert_eq!(medicine.encounters_with_event, 2);
    assert_eq!(medicine.encounters_reported, 1);
    assert_eq!(medicine.on_time_encounters, 0);
    assert!(close(medicine.compliance_rate, 0.5));
    assert!(close(medicine.timeliness_rate, 0.0));
    assert!(close(medicine.adr_per_1000, 500.0));
    assert!(close(medicine.severe_per_1000, 500.0));
    assert!(close(medicine.high_risk_exposure_rate, 0.5));

    // An unreported near miss counts as an encounter with an event
    let icu = &rows[2];
    assert_eq!(icu.encounters_with_event, 1);
    assert!(close(icu.compliance_rate, 0.0));

    let quiet = &rows[3];
    assert_eq!(quiet.encounters_with_event, 0);
    assert!(close(quiet.compliance_rate, 0.0));
    assert!(close(quiet.timeliness_rate, 0.0));
    Ok(())
}

/// Test that overall counts equal the sum over service lines and the rates
/// are recomputed from those sums
#[test]
fn test_kpi_overall_matches_service_sums() -> clinops_metrics::Result<()> {
    let fixture = store_with(&sample_raw());
    run_full_pipeline(&fixture.store, &PipelineConfig::default())?;
    let service: Vec<KpiMonthly> = fixture.store.load_rows(KPI_MONTHLY_SERVICE)?;
    let overall: Vec<KpiMonthly> = fixture.store.load_rows(KPI_MONTHLY_OVERALL)?;

    let months: Vec<&str> = overall.iter().map(|r| r.month.as_str()).collect();
    assert_eq!(months, ["2024-01", "2024-02", "2024-03"]);

    for row in &overall {
        assert_eq!(row.service_line, None);
        let parts: Vec<&KpiMonthly> = service.iter().filter(|s| s.month == row.month).collect();
        let total: i64 = parts.iter().map(|s| s.total_encounters).sum();
        let with_event: i64 = parts.iter().map(|s| s.encounters_with_event).sum();
        let reported: i64 = parts.iter().map(|s| s.encounters_reported).sum();
        assert_eq!(row.total_encounters, total);
        assert_eq!(row.encounters_with_event, with_event);
        assert_eq!(row.encounters_reported, reported);
    }

    // February: Surgery complies fully, ICU not at all
    let february = &overall[1];
    assert!(close(february.compliance_rate, 0.5));
    assert!(close(february.timeliness_rate, 1.0));
    Ok(())
}

/// Test that a month mixing a service line without events and one with
/// events gets the ratio of summed counts, not a mean of the two rates
#[test]
fn test_overall_rate_ignores_quiet_service_line() -> clinops_metrics::Result<()> {
    let mut raw = sample_raw();
    raw.patients.push(patient("P4"));
    for (id, day) in [("E6", 18), ("E7", 20)] {
        raw.encounters.push(encounter(
            id,
            "P4",
            ServiceLine::Medicine,
            AdmissionType::Outpatient,
            date(2024, 3, day),
            date(2024, 3, day),
        ));
    }
    raw.events
        .push(event("V5", "E6", EventType::Allergy, Severity::Mild, 2, true));
    raw.events
        .push(event("V6", "E7", EventType::Omission, Severity::Mild, 0, false));
    let fixture = store_with(&raw);
    run_full_pipeline(&fixture.store, &PipelineConfig::default())?;

    let service: Vec<KpiMonthly> = fixture.store.load_rows(KPI_MONTHLY_SERVICE)?;
    let march: Vec<&KpiMonthly> = service.iter().filter(|r| r.month == "2024-03").collect();
    assert_eq!(march.len(), 2);
    let medicine = march
        .iter()
        .find(|r| r.service_line == Some(ServiceLine::Medicine))
        .unwrap();
    let surgery = march
        .iter()
        .find(|r| r.service_line == Some(ServiceLine::Surgery))
        .unwrap();
    assert_eq!((surgery.encounters_with_event, surgery.encounters_reported), (0, 0));
    assert_eq!((medicine.encounters_with_event, medicine.encounters_reported), (2, 1));

    let overall: Vec<KpiMonthly> = fixture.store.load_rows(KPI_MONTHLY_OVERALL)?;
    let total = overall.iter().find(|r| r.month == "2024-03").unwrap();
    let expected = medicine.encounters_reported as f64 / medicine.encounters_with_event as f64;
    assert!(close(total.compliance_rate, expected));
    assert!(close(total.compliance_rate, 0.5));
    assert!(close(total.timeliness_rate, 1.0));
    assert_eq!(total.total_encounters, 3);
    Ok(())
}

/// Bucket label, order and count of one (month, service line) histogram
fn histogram<'a>(
    bins: &'a [DelayBinCount],
    month: &str,
    service_line: ServiceLine,
) -> Vec<(&'a str, i64, i64)> {
    bins.iter()
        .filter(|b| b.month == month && b.service_line == service_line)
        .map(|b| (b.delay_bin.as_str(), b.bin_order, b.count))
        .collect()
}

/// Test the event counts and the reporting-delay histogram
#[test]
fn test_event_metrics_and_delay_bins() -> clinops_metrics::Result<()> {
    let fixture = store_with(&sample_raw());
    run_full_pipeline(&fixture.store, &PipelineConfig::default())?;

    let metrics: Vec<EventMetric> = fixture.store.load_rows(EVENT_METRICS_MONTHLY)?;
    let counts: Vec<(&str, ServiceLine, EventType, i64)> = metrics
        .iter()
        .map(|m| (m.month.as_str(), m.service_line, m.event_type, m.event_count))
        .collect();
    assert_eq!(
        counts,
        [
            ("2024-01", ServiceLine::Medicine, EventType::Adr, 1),
            ("2024-01", ServiceLine::Medicine, EventType::NearMiss, 1),
            ("2024-02", ServiceLine::Surgery, EventType::MedError, 1),
            ("2024-02", ServiceLine::Icu, EventType::NearMiss, 1),
        ]
    );

    let bins: Vec<DelayBinCount> = fixture.store.load_rows(REPORTING_DELAY_BINS)?;
    // Three groups with events, six buckets each
    assert_eq!(bins.len(), 18);

    assert_eq!(
        histogram(&bins, "2024-01", ServiceLine::Medicine),
        [
            ("0-1", 0, 1),
            ("2-3", 1, 0),
            ("4-7", 2, 0),
            ("8-14", 3, 1),
            ("15-30", 4, 0),
            ("31+", 5, 0),
        ]
    );
    let surgery: Vec<i64> = histogram(&bins, "2024-02", ServiceLine::Surgery)
        .iter()
        .map(|(_, _, count)| *count)
        .collect();
    assert_eq!(surgery, [0, 1, 0, 0, 0, 0]);
    let icu: Vec<i64> = histogram(&bins, "2024-02", ServiceLine::Icu)
        .iter()
        .map(|(_, _, count)| *count)
        .collect();
    assert_eq!(icu, [1, 0, 0, 0, 0, 0]);

    // Rows come out by month, then service line, then bucket order
    let keys: Vec<(&str, ServiceLine, i64)> = bins
        .iter()
        .map(|b| (b.month.as_str(), b.service_line, b.bin_order))
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);

    // March has encounters but no events
    assert!(bins.iter().all(|b| b.month != "2024-03"));
    Ok(())
}

/// Test that the audit view holds the high-risk, adverse, late encounter only
#[test]
fn test_audit_view() -> clinops_metrics::Result<()> {
    let fixture = store_with(&sample_raw());
    run_full_pipeline(&fixture.store, &PipelineConfig::default())?;

    let audit: Vec<EncounterFact> = fixture.store.load_rows(AUDIT_VIEW)?;
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].encounter_id, "E1");
    assert!(audit[0].high_risk_exposure_flag);
    Ok(())
}

/// Test that reporting the ADR on time empties the audit view
#[test]
fn test_audit_view_can_be_empty() -> clinops_metrics::Result<()> {
    let mut raw = sample_raw();
    raw.events[0].report_delay_days = 2;
    let fixture = store_with(&raw);
    run_full_pipeline(&fixture.store, &PipelineConfig::default())?;

    let audit: Vec<EncounterFact> = fixture.store.load_rows(AUDIT_VIEW)?;
    assert!(audit.is_empty());
    assert_eq!(fixture.store.read_table(AUDIT_VIEW)?.num_columns(), 18);
    Ok(())
}

/// Test that an orphan event is counted once and left out of the metrics
#[test]
fn test_orphan_event_detected() -> clinops_metrics::Result<()> {
    let mut raw = sample_raw();
    raw.events
        .push(event("V9", "E-GHOST", EventType::Adr, Severity::Severe, 40, true));
    let fixture = store_with(&raw);
    let summary = run_full_pipeline(&fixture.store, &PipelineConfig::default())?;
    assert!(!summary.quality_passed());

    let report: Vec<QualityCheck> = fixture.store.load_rows(DATA_QUALITY_REPORT)?;
    let orphans = report
        .iter()
        .find(|c| c.check == "Safety Events Orphans")
        .unwrap();
    assert_eq!(orphans.count, 1);
    assert_eq!(orphans.status, CheckStatus::Fail);
    // The other checks still ran
    assert_eq!(report.len(), 6);
    assert!(report.iter().filter(|c| c.check != orphans.check).all(QualityCheck::passed));

    let bins: Vec<DelayBinCount> = fixture.store.load_rows(REPORTING_DELAY_BINS)?;
    assert!(
        bins.iter()
            .filter(|b| b.delay_bin.as_str() == "31+")
            .all(|b| b.count == 0)
    );
    assert_eq!(bins.iter().map(|b| b.count).sum::<i64>(), 4);
    let metrics: Vec<EventMetric> = fixture.store.load_rows(EVENT_METRICS_MONTHLY)?;
    assert_eq!(metrics.iter().map(|m| m.event_count).sum::<i64>(), 4);
    Ok(())
}

/// Test that a discharge before admission is flagged and kept
#[test]
fn test_negative_length_of_stay_is_flagged() -> clinops_metrics::Result<()> {
    let mut raw = sample_raw();
    raw.encounters[4].discharge_date = crate::utils::date(2024, 2, 8);
    let fixture = store_with(&raw);
    run_full_pipeline(&fixture.store, &PipelineConfig::default())?;

    let report: Vec<QualityCheck> = fixture.store.load_rows(DATA_QUALITY_REPORT)?;
    let negative = report.iter().find(|c| c.check == "Negative LOS").unwrap();
    assert_eq!(negative.count, 1);
    assert_eq!(negative.status, CheckStatus::Fail);
    Ok(())
}
