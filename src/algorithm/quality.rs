//! Audit worklist and data-quality checks
//!
//! The quality gate never fails: every check runs and contributes one row,
//! whatever the earlier checks found.

use rustc_hash::FxHashSet;

use crate::models::{
    CheckStatus, Encounter, EncounterFact, MedicationOrder, Patient, QualityCheck, SafetyEvent,
};

pub const SAFETY_EVENTS_ORPHANS: &str = "Safety Events Orphans";
pub const NEGATIVE_LOS: &str = "Negative LOS";
pub const MED_ORDERS_ORPHANS: &str = "Med Orders Orphans";
pub const ENCOUNTER_PATIENT_ORPHANS: &str = "Encounter Patient Orphans";
pub const ENCOUNTER_FACTS_UNIQUE: &str = "Encounter Facts Unique";
pub const ENCOUNTERS_PRESENT: &str = "Encounters Present";

/// High-risk exposure with an adverse outcome that was reported late
#[must_use]
pub fn needs_audit(fact: &EncounterFact) -> bool {
    fact.high_risk_exposure_flag && fact.has_adverse_outcome() && fact.late_reporting_flag_any
}

/// Fact rows matching the audit criteria, unchanged and in fact-table order
#[must_use]
pub fn build_audit_view(facts: &[EncounterFact]) -> Vec<EncounterFact> {
    facts.iter().filter(|fact| needs_audit(fact)).cloned().collect()
}

/// Inputs the quality gate inspects
#[derive(Debug, Clone, Copy)]
pub struct QualityInputs<'a> {
    pub facts: &'a [EncounterFact],
    pub patients: &'a [Patient],
    pub encounters: &'a [Encounter],
    pub orders: &'a [MedicationOrder],
    pub events: &'a [SafetyEvent],
}

/// Run every check and return one row per check, in a fixed order
#[must_use]
pub fn run_quality_checks(inputs: &QualityInputs<'_>) -> Vec<QualityCheck> {
    let fact_ids: FxHashSet<&str> = inputs
        .facts
        .iter()
        .map(|fact| fact.encounter_id.as_str())
        .collect();
    let patient_ids: FxHashSet<&str> = inputs
        .patients
        .iter()
        .map(|patient| patient.patient_id.as_str())
        .collect();

    let event_orphans = inputs
        .events
        .iter()
        .filter(|event| !fact_ids.contains(event.encounter_id.as_str()))
        .count();
    let negative_los = inputs
        .facts
        .iter()
        .filter(|fact| fact.length_of_stay_days < 0)
        .count();
    let order_orphans = inputs
        .orders
        .iter()
        .filter(|order| !fact_ids.contains(order.encounter_id.as_str()))
        .count();
    let patient_orphans = inputs
        .encounters
        .iter()
        .filter(|encounter| !patient_ids.contains(encounter.patient_id.as_str()))
        .count();
    let duplicate_facts = inputs.facts.len() - fact_ids.len();

    vec![
        QualityCheck::from_count(SAFETY_EVENTS_ORPHANS, event_orphans),
        QualityCheck::from_count(NEGATIVE_LOS, negative_los),
        QualityCheck::from_count(MED_ORDERS_ORPHANS, order_orphans),
        QualityCheck::from_count(ENCOUNTER_PATIENT_ORPHANS, patient_orphans),
        QualityCheck::from_count(ENCOUNTER_FACTS_UNIQUE, duplicate_facts),
        encounters_present(inputs.facts.len()),
    ]
}

/// Passes with the fact count when there is at least one fact row
fn encounters_present(fact_count: usize) -> QualityCheck {
    let mut check = QualityCheck::from_count(ENCOUNTERS_PRESENT, fact_count);
    check.status = if fact_count > 0 {
        CheckStatus::Pass
    } else {
        CheckStatus::Fail
    };
    check
}
