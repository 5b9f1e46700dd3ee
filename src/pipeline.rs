//! Full pipeline run and delivery verification
//!
//! A run loads the four raw tables, derives every output table in memory and
//! only then touches the store. All outputs are staged first and renamed into
//! place once every one of them has been written, so a failing run leaves the
//! previous outputs in place.

use std::time::{Duration, Instant};

use arrow::record_batch::RecordBatch;
use indicatif::ProgressBar;
use rustc_hash::FxHashSet;

use crate::algorithm::{
    QualityInputs, build_audit_view, build_delay_bins, build_encounter_facts,
    build_event_metrics, build_kpi_monthly_overall, build_kpi_monthly_service,
    event_encounter_ids, run_quality_checks,
};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::models::{
    DelayBinCount, Encounter, EncounterFact, EventMetric, KpiMonthly, MedicationOrder, Patient,
    QualityCheck, SafetyEvent,
};
use crate::schema::{
    ArrowSchema, AUDIT_VIEW, DATA_QUALITY_REPORT, DERIVED_TABLES, ENCOUNTER_FACTS, ENCOUNTERS,
    EVENT_METRICS_MONTHLY, KPI_MONTHLY_OVERALL, KPI_MONTHLY_SERVICE, MED_ORDERS, PATIENTS,
    RAW_TABLES, REPORTING_DELAY_BINS, SAFETY_EVENTS,
};
use crate::store::{StagedTable, TableStore};
use crate::utils::logging::{log_stage_complete, log_warning};

/// Number of progress steps reported by a run
pub const STAGE_COUNT: u64 = 6;

/// The four raw input tables
#[derive(Debug, Clone, Default)]
pub struct RawTables {
    pub patients: Vec<Patient>,
    pub encounters: Vec<Encounter>,
    pub orders: Vec<MedicationOrder>,
    pub events: Vec<SafetyEvent>,
}

impl RawTables {
    /// Load and validate the raw tables.
    ///
    /// Every table must exist. `patients` and `encounters` must hold rows,
    /// while `med_orders` and `safety_events` may be empty.
    pub fn load(store: &TableStore) -> Result<Self> {
        let raw = Self {
            patients: store.load_rows(PATIENTS)?,
            encounters: store.load_rows(ENCOUNTERS)?,
            orders: store.load_rows(MED_ORDERS)?,
            events: store.load_rows(SAFETY_EVENTS)?,
        };
        raw.validate()?;
        Ok(raw)
    }

    /// Reject inputs the derivations cannot give a meaning to
    pub fn validate(&self) -> Result<()> {
        if self.patients.is_empty() {
            return Err(PipelineError::EmptyTable {
                table: PATIENTS.to_string(),
            });
        }
        if self.encounters.is_empty() {
            return Err(PipelineError::EmptyTable {
                table: ENCOUNTERS.to_string(),
            });
        }
        if let Some(event) = self.events.iter().find(|e| e.report_delay_days < 0) {
            return Err(PipelineError::invalid_value(
                SAFETY_EVENTS,
                "report_delay_days",
                event.report_delay_days,
            ));
        }
        Ok(())
    }
}

/// Every output table of a run, as typed rows
#[derive(Debug, Clone)]
pub struct DerivedTables {
    pub encounter_facts: Vec<EncounterFact>,
    pub kpi_monthly_service: Vec<KpiMonthly>,
    pub kpi_monthly_overall: Vec<KpiMonthly>,
    pub event_metrics_monthly: Vec<EventMetric>,
    pub reporting_delay_bins: Vec<DelayBinCount>,
    pub audit_view: Vec<EncounterFact>,
    pub data_quality_report: Vec<QualityCheck>,
}

impl DerivedTables {
    /// Convert every table to a record batch, in [`DERIVED_TABLES`] order
    pub fn to_batches(&self) -> Result<Vec<(&'static str, RecordBatch)>> {
        Ok(vec![
            (
                ENCOUNTER_FACTS,
                EncounterFact::to_record_batch(ENCOUNTER_FACTS, &self.encounter_facts)?,
            ),
            (
                KPI_MONTHLY_SERVICE,
                KpiMonthly::to_record_batch(KPI_MONTHLY_SERVICE, &self.kpi_monthly_service)?,
            ),
            (
                KPI_MONTHLY_OVERALL,
                KpiMonthly::to_record_batch(KPI_MONTHLY_OVERALL, &self.kpi_monthly_overall)?,
            ),
            (
                EVENT_METRICS_MONTHLY,
                EventMetric::to_record_batch(EVENT_METRICS_MONTHLY, &self.event_metrics_monthly)?,
            ),
            (
                REPORTING_DELAY_BINS,
                DelayBinCount::to_record_batch(REPORTING_DELAY_BINS, &self.reporting_delay_bins)?,
            ),
            (
                AUDIT_VIEW,
                EncounterFact::to_record_batch(AUDIT_VIEW, &self.audit_view)?,
            ),
            (
                DATA_QUALITY_REPORT,
                QualityCheck::to_record_batch(DATA_QUALITY_REPORT, &self.data_quality_report)?,
            ),
        ])
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct PipelineSummary {
    /// Row count of each written table, in [`DERIVED_TABLES`] order
    pub tables: Vec<(String, usize)>,
    /// The data-quality report that was written
    pub quality: Vec<QualityCheck>,
    pub elapsed: Duration,
}

impl PipelineSummary {
    /// Row count of a written table
    #[must_use]
    pub fn rows(&self, table: &str) -> Option<usize> {
        self.tables
            .iter()
            .find(|(name, _)| name == table)
            .map(|(_, rows)| *rows)
    }

    /// Whether every quality check passed
    #[must_use]
    pub fn quality_passed(&self) -> bool {
        self.quality.iter().all(QualityCheck::passed)
    }
}

fn advance(progress: Option<&ProgressBar>, message: &'static str) {
    if let Some(pb) = progress {
        pb.set_message(message);
        pb.inc(1);
    }
}

/// Derive every output table from the raw tables
#[must_use]
pub fn derive_tables(raw: &RawTables, config: &PipelineConfig) -> DerivedTables {
    derive_with_progress(raw, config, None)
}

fn derive_with_progress(
    raw: &RawTables,
    config: &PipelineConfig,
    progress: Option<&ProgressBar>,
) -> DerivedTables {
    let start = Instant::now();
    let encounter_facts = build_encounter_facts(&raw.encounters, &raw.orders, &raw.events, config);
    log_stage_complete("Fact builder", ENCOUNTER_FACTS, encounter_facts.len(), start.elapsed());
    advance(progress, "Encounter facts built");

    let start = Instant::now();
    let event_encounters = event_encounter_ids(&raw.events);
    let kpi_monthly_service = build_kpi_monthly_service(&encounter_facts, &event_encounters);
    let kpi_monthly_overall = build_kpi_monthly_overall(&encounter_facts, &event_encounters);
    log_stage_complete(
        "KPI aggregator",
        KPI_MONTHLY_SERVICE,
        kpi_monthly_service.len(),
        start.elapsed(),
    );
    log_stage_complete(
        "KPI aggregator",
        KPI_MONTHLY_OVERALL,
        kpi_monthly_overall.len(),
        start.elapsed(),
    );
    advance(progress, "KPIs aggregated");

    let start = Instant::now();
    let event_metrics_monthly = build_event_metrics(&raw.events, &encounter_facts);
    let reporting_delay_bins = build_delay_bins(&raw.events, &encounter_facts);
    log_stage_complete(
        "Event metrics",
        EVENT_METRICS_MONTHLY,
        event_metrics_monthly.len(),
        start.elapsed(),
    );
    log_stage_complete(
        "Event metrics",
        REPORTING_DELAY_BINS,
        reporting_delay_bins.len(),
        start.elapsed(),
    );
    advance(progress, "Event metrics built");

    let start = Instant::now();
    let audit_view = build_audit_view(&encounter_facts);
    let data_quality_report = run_quality_checks(&QualityInputs {
        facts: &encounter_facts,
        patients: &raw.patients,
        encounters: &raw.encounters,
        orders: &raw.orders,
        events: &raw.events,
    });
    log_stage_complete("Quality gate", AUDIT_VIEW, audit_view.len(), start.elapsed());
    log_stage_complete(
        "Quality gate",
        DATA_QUALITY_REPORT,
        data_quality_report.len(),
        start.elapsed(),
    );
    for check in data_quality_report.iter().filter(|check| !check.passed()) {
        log_warning(
            &format!("check '{}' failed with count {}", check.check, check.count),
            Some(DATA_QUALITY_REPORT),
        );
    }
    advance(progress, "Quality checks run");

    DerivedTables {
        encounter_facts,
        kpi_monthly_service,
        kpi_monthly_overall,
        event_metrics_monthly,
        reporting_delay_bins,
        audit_view,
        data_quality_report,
    }
}

/// Stage every batch, then commit them all. A failed stage discards the
/// batches staged so far without touching any live table. A failed commit
/// discards the batches not yet committed.
fn persist(store: &TableStore, batches: &[(&'static str, RecordBatch)]) -> Result<Vec<(String, usize)>> {
    let mut staged: Vec<StagedTable> = Vec::with_capacity(batches.len());
    for (table, batch) in batches {
        match store.stage_table(table, batch) {
            Ok(stage) => staged.push(stage),
            Err(e) => {
                staged.into_iter().for_each(StagedTable::discard);
                return Err(e);
            }
        }
    }

    let mut written = Vec::with_capacity(staged.len());
    let mut pending = staged.into_iter();
    while let Some(stage) = pending.next() {
        let entry = (stage.table().to_string(), stage.rows());
        if let Err(e) = stage.commit() {
            pending.for_each(StagedTable::discard);
            return Err(e);
        }
        written.push(entry);
    }
    Ok(written)
}

/// Rebuild every derived table from the raw tables in `store`
pub fn run_full_pipeline(store: &TableStore, config: &PipelineConfig) -> Result<PipelineSummary> {
    run_full_pipeline_with_progress(store, config, None)
}

/// Same as [`run_full_pipeline`], advancing `progress` once per stage
pub fn run_full_pipeline_with_progress(
    store: &TableStore,
    config: &PipelineConfig,
    progress: Option<&ProgressBar>,
) -> Result<PipelineSummary> {
    let start = Instant::now();
    log::info!("Running pipeline on {}", store.root().display());
    log::debug!("{config}");

    let raw = RawTables::load(store)?;
    log::info!(
        "Loaded {} patients, {} encounters, {} medication orders, {} safety events",
        raw.patients.len(),
        raw.encounters.len(),
        raw.orders.len(),
        raw.events.len()
    );
    advance(progress, "Raw tables loaded");

    let derived = derive_with_progress(&raw, config, progress);
    let batches = derived.to_batches()?;
    let tables = persist(store, &batches)?;
    advance(progress, "Tables written");

    let elapsed = start.elapsed();
    log::info!("Pipeline finished in {elapsed:?}");
    Ok(PipelineSummary {
        tables,
        quality: derived.data_quality_report,
        elapsed,
    })
}

/// State of a store after delivery
#[derive(Debug, Clone, Default)]
pub struct DeliveryReport {
    /// Row counts of required tables that exist
    pub present: Vec<(String, usize)>,
    /// Required tables that do not exist
    pub missing: Vec<String>,
    /// Fact rows beyond one per encounter id, when the fact table exists
    pub duplicate_facts: Option<usize>,
    /// Stored data-quality report, when it exists
    pub quality: Option<Vec<QualityCheck>>,
}

impl DeliveryReport {
    /// Every required table exists, facts are unique and every check passed
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
            && self.duplicate_facts == Some(0)
            && self
                .quality
                .as_ref()
                .is_some_and(|checks| checks.iter().all(QualityCheck::passed))
    }
}

/// Inspect the raw and derived tables in `store` without modifying them
pub fn verify_delivery(store: &TableStore) -> Result<DeliveryReport> {
    let mut report = DeliveryReport::default();
    for table in RAW_TABLES.iter().chain(DERIVED_TABLES.iter()) {
        if store.contains(table) {
            report.present.push(((*table).to_string(), store.row_count(table)?));
        } else {
            report.missing.push((*table).to_string());
        }
    }

    if store.contains(ENCOUNTER_FACTS) {
        let facts: Vec<EncounterFact> = store.load_rows(ENCOUNTER_FACTS)?;
        let distinct: FxHashSet<&str> = facts.iter().map(|f| f.encounter_id.as_str()).collect();
        report.duplicate_facts = Some(facts.len() - distinct.len());
    }
    if store.contains(DATA_QUALITY_REPORT) {
        report.quality = Some(store.load_rows(DATA_QUALITY_REPORT)?);
    }
    Ok(report)
}
