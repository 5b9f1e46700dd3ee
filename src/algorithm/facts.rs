//! Encounter fact derivation
//!
//! Joins encounters with their medication orders and safety events and adds
//! the per-patient temporal windows (30-day readmission, 7-day ED revisit).

use itertools::Itertools;
use rustc_hash::FxHashMap;

use crate::config::PipelineConfig;
use crate::models::{
    AdmissionType, Encounter, EncounterFact, EventType, MedicationOrder, SafetyEvent, Severity,
};

/// Medication orders of one encounter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MedicationAggregate {
    pub order_count: i64,
    pub high_risk_exposure: bool,
}

/// Safety events of one encounter, reduced to flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventAggregate {
    pub any_event: bool,
    pub adr: bool,
    pub med_error: bool,
    pub severe: bool,
    pub reported: bool,
    pub reported_on_time: bool,
    pub reported_late: bool,
}

/// Aggregates keyed by encounter id
pub type AggregateIndex<'a, T> = FxHashMap<&'a str, T>;

/// Look up an aggregate for a left-joined encounter. Encounters without
/// matching rows get the aggregate's `Default`, which is the only fill value
/// used for joined columns.
#[must_use]
pub fn fill_default<T: Default + Copy>(index: &AggregateIndex<'_, T>, encounter_id: &str) -> T {
    index.get(encounter_id).copied().unwrap_or_default()
}

/// Count orders and OR their high-risk flags per encounter
#[must_use]
pub fn aggregate_medications(orders: &[MedicationOrder]) -> AggregateIndex<'_, MedicationAggregate> {
    let mut index = AggregateIndex::default();
    for order in orders {
        let entry: &mut MedicationAggregate =
            index.entry(order.encounter_id.as_str()).or_default();
        entry.order_count += 1;
        entry.high_risk_exposure |= order.high_risk_flag;
    }
    index
}

/// Reduce safety events to per-encounter flags
#[must_use]
pub fn aggregate_events(
    events: &[SafetyEvent],
    on_time_threshold_days: i64,
) -> AggregateIndex<'_, EventAggregate> {
    let mut index = AggregateIndex::default();
    for event in events {
        let entry: &mut EventAggregate = index.entry(event.encounter_id.as_str()).or_default();
        entry.any_event = true;
        entry.adr |= event.event_type == EventType::Adr;
        entry.med_error |= event.event_type == EventType::MedError;
        entry.severe |= event.severity == Severity::Severe;
        entry.reported |= event.reported_flag;
        entry.reported_on_time |= event.is_reported_on_time(on_time_threshold_days);
        entry.reported_late |= event.is_reported_late(on_time_threshold_days);
    }
    index
}

/// Build one fact row per encounter, in the order the encounters were given
#[must_use]
pub fn build_encounter_facts(
    encounters: &[Encounter],
    orders: &[MedicationOrder],
    events: &[SafetyEvent],
    config: &PipelineConfig,
) -> Vec<EncounterFact> {
    let medications = aggregate_medications(orders);
    let event_flags = aggregate_events(events, config.on_time_threshold_days);

    let mut facts: Vec<EncounterFact> = encounters
        .iter()
        .map(|encounter| {
            let meds = fill_default(&medications, &encounter.encounter_id);
            let flags = fill_default(&event_flags, &encounter.encounter_id);

            let mut fact = EncounterFact::from_encounter(encounter);
            fact.med_orders_count = meds.order_count;
            fact.high_risk_exposure_flag = meds.high_risk_exposure;
            fact.adr_flag = flags.adr;
            fact.med_error_flag = flags.med_error;
            fact.severe_event_flag = flags.severe;
            fact.reported_flag_any = flags.reported;
            fact.on_time_flag_any = flags.reported_on_time;
            fact.late_reporting_flag_any = flags.reported_late;
            fact.has_any_event = flags.any_event;
            fact
        })
        .collect();

    apply_temporal_windows(&mut facts, config);
    facts
}

/// Set the readmission and ED revisit flags.
///
/// Each patient's encounters are ordered by admit date; encounters admitted
/// on the same day keep their relative input order. The gap to the next
/// encounter is measured from this encounter's discharge to the next admit.
pub fn apply_temporal_windows(facts: &mut [EncounterFact], config: &PipelineConfig) {
    let by_patient = (0..facts.len()).into_group_map_by(|&i| facts[i].patient_id.clone());

    let mut windows = Vec::new();
    for mut indices in by_patient.into_values() {
        // Stable: ties stay in input order
        indices.sort_by_key(|&i| facts[i].admit_date);

        for (&current, &next) in indices.iter().tuple_windows() {
            let gap = (facts[next].admit_date - facts[current].discharge_date).num_days();
            let readmission = (0..=config.readmission_window_days).contains(&gap);
            let ed_revisit = (0..=config.ed_revisit_window_days).contains(&gap)
                && facts[next].admission_type == AdmissionType::Ed;
            windows.push((current, readmission, ed_revisit));
        }
    }

    for (index, readmission, ed_revisit) in windows {
        facts[index].readmission_30d_flag = readmission;
        facts[index].ed_revisit_7d_flag = ed_revisit;
    }
}
