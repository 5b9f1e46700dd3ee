//! Monthly KPI aggregation
//!
//! Counters are summed per group and the rates are computed from the sums.
//! Rates are never averaged across rows or subgroups.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;

use crate::models::{EncounterFact, KpiMonthly, SafetyEvent, ServiceLine};
use crate::utils::safe_ratio;

/// Additive counters behind every KPI rate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KpiCounters {
    pub total_encounters: i64,
    pub encounters_with_event: i64,
    pub encounters_reported: i64,
    pub on_time_encounters: i64,
    pub adr_count: i64,
    pub severe_count: i64,
    pub high_risk_exposure_count: i64,
}

impl KpiCounters {
    /// Add one encounter to the group
    pub fn observe(&mut self, fact: &EncounterFact, has_event: bool) {
        self.total_encounters += 1;
        self.encounters_with_event += i64::from(has_event);
        self.encounters_reported += i64::from(fact.reported_flag_any);
        self.on_time_encounters += i64::from(fact.on_time_flag_any);
        self.adr_count += i64::from(fact.adr_flag);
        self.severe_count += i64::from(fact.severe_event_flag);
        self.high_risk_exposure_count += i64::from(fact.high_risk_exposure_flag);
    }

    /// Combine two groups by summing their counters
    pub fn merge(&mut self, other: &Self) {
        self.total_encounters += other.total_encounters;
        self.encounters_with_event += other.encounters_with_event;
        self.encounters_reported += other.encounters_reported;
        self.on_time_encounters += other.on_time_encounters;
        self.adr_count += other.adr_count;
        self.severe_count += other.severe_count;
        self.high_risk_exposure_count += other.high_risk_exposure_count;
    }

    /// Reported encounters over encounters with any event
    #[must_use]
    pub fn compliance_rate(&self) -> f64 {
        safe_ratio(self.encounters_reported, self.encounters_with_event)
    }

    /// On-time encounters over reported encounters
    #[must_use]
    pub fn timeliness_rate(&self) -> f64 {
        safe_ratio(self.on_time_encounters, self.encounters_reported)
    }

    #[must_use]
    pub fn adr_per_1000(&self) -> f64 {
        safe_ratio(self.adr_count, self.total_encounters) * 1000.0
    }

    #[must_use]
    pub fn severe_per_1000(&self) -> f64 {
        safe_ratio(self.severe_count, self.total_encounters) * 1000.0
    }

    #[must_use]
    pub fn high_risk_exposure_rate(&self) -> f64 {
        safe_ratio(self.high_risk_exposure_count, self.total_encounters)
    }

    /// Materialize the group as a KPI row
    #[must_use]
    pub fn to_row(&self, month: String, service_line: Option<ServiceLine>) -> KpiMonthly {
        KpiMonthly {
            month,
            service_line,
            total_encounters: self.total_encounters,
            encounters_with_event: self.encounters_with_event,
            encounters_reported: self.encounters_reported,
            on_time_encounters: self.on_time_encounters,
            compliance_rate: self.compliance_rate(),
            timeliness_rate: self.timeliness_rate(),
            adr_count: self.adr_count,
            severe_count: self.severe_count,
            high_risk_exposure_count: self.high_risk_exposure_count,
            adr_per_1000: self.adr_per_1000(),
            severe_per_1000: self.severe_per_1000(),
            high_risk_exposure_rate: self.high_risk_exposure_rate(),
        }
    }
}

/// Distinct encounter ids referenced by at least one safety event.
///
/// This is the only definition of "encounter with an event": no single
/// derived flag implies it, since an unreported mild near miss sets none.
#[must_use]
pub fn event_encounter_ids(events: &[SafetyEvent]) -> FxHashSet<&str> {
    events.iter().map(|event| event.encounter_id.as_str()).collect()
}

/// Counters per (admit month, service line)
#[must_use]
pub fn service_counters(
    facts: &[EncounterFact],
    event_encounters: &FxHashSet<&str>,
) -> BTreeMap<(String, ServiceLine), KpiCounters> {
    let mut groups: BTreeMap<(String, ServiceLine), KpiCounters> = BTreeMap::new();
    for fact in facts {
        let has_event = event_encounters.contains(fact.encounter_id.as_str());
        groups
            .entry((fact.month(), fact.service_line))
            .or_default()
            .observe(fact, has_event);
    }
    groups
}

/// Sum the service line counters of each month
#[must_use]
pub fn monthly_counters(
    service: &BTreeMap<(String, ServiceLine), KpiCounters>,
) -> BTreeMap<String, KpiCounters> {
    let mut months: BTreeMap<String, KpiCounters> = BTreeMap::new();
    for ((month, _), counters) in service {
        months.entry(month.clone()).or_default().merge(counters);
    }
    months
}

/// KPIs per admit month and service line, ordered by month then service line
#[must_use]
pub fn build_kpi_monthly_service(
    facts: &[EncounterFact],
    event_encounters: &FxHashSet<&str>,
) -> Vec<KpiMonthly> {
    service_counters(facts, event_encounters)
        .into_iter()
        .map(|((month, service_line), counters)| counters.to_row(month, Some(service_line)))
        .collect()
}

/// KPIs per admit month across all service lines, ordered by month.
///
/// Built by merging the service line counters, so every overall rate is a
/// ratio of summed counts.
#[must_use]
pub fn build_kpi_monthly_overall(
    facts: &[EncounterFact],
    event_encounters: &FxHashSet<&str>,
) -> Vec<KpiMonthly> {
    monthly_counters(&service_counters(facts, event_encounters))
        .into_iter()
        .map(|(month, counters)| counters.to_row(month, None))
        .collect()
}
