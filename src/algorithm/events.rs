//! Monthly event metrics and reporting-delay histograms

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::models::{
    DelayBin, DelayBinCount, EncounterFact, EventMetric, EventType, SafetyEvent, ServiceLine,
};
use crate::schema::{EVENT_METRICS_MONTHLY, REPORTING_DELAY_BINS, SAFETY_EVENTS};
use crate::utils::logging::log_warning;

/// Month and service line of each encounter, for joining events
type EncounterContext<'a> = FxHashMap<&'a str, (String, ServiceLine)>;

const BIN_COUNT: usize = DelayBin::ALL.len();

fn encounter_context(facts: &[EncounterFact]) -> EncounterContext<'_> {
    facts
        .iter()
        .map(|fact| (fact.encounter_id.as_str(), (fact.month(), fact.service_line)))
        .collect()
}

/// Resolve each event to its encounter's month and service line, dropping
/// events whose encounter is unknown
fn resolved_events<'a>(
    events: &'a [SafetyEvent],
    context: &'a EncounterContext<'_>,
) -> impl Iterator<Item = (&'a SafetyEvent, &'a (String, ServiceLine))> {
    events.iter().filter_map(move |event| {
        context
            .get(event.encounter_id.as_str())
            .map(|resolved| (event, resolved))
    })
}

fn warn_on_orphans(events: &[SafetyEvent], context: &EncounterContext<'_>, table: &str) {
    let orphans = events
        .iter()
        .filter(|event| !context.contains_key(event.encounter_id.as_str()))
        .count();
    if orphans > 0 {
        log_warning(
            &format!("{orphans} {SAFETY_EVENTS} rows reference unknown encounters and were left out"),
            Some(table),
        );
    }
}

/// Count events per month, service line and event type
#[must_use]
pub fn build_event_metrics(events: &[SafetyEvent], facts: &[EncounterFact]) -> Vec<EventMetric> {
    let context = encounter_context(facts);
    warn_on_orphans(events, &context, EVENT_METRICS_MONTHLY);

    let mut counts: BTreeMap<(String, ServiceLine, EventType), i64> = BTreeMap::new();
    for (event, (month, service_line)) in resolved_events(events, &context) {
        *counts
            .entry((month.clone(), *service_line, event.event_type))
            .or_default() += 1;
    }

    counts
        .into_iter()
        .map(|((month, service_line, event_type), event_count)| EventMetric {
            month,
            service_line,
            event_type,
            event_count,
        })
        .collect()
}

/// Count events per month, service line and reporting-delay bucket.
///
/// Every (month, service line) pair with at least one event gets all six
/// buckets, zero-filled, in month, service line and bucket display order.
#[must_use]
pub fn build_delay_bins(events: &[SafetyEvent], facts: &[EncounterFact]) -> Vec<DelayBinCount> {
    let context = encounter_context(facts);
    warn_on_orphans(events, &context, REPORTING_DELAY_BINS);

    let mut histograms: BTreeMap<(String, ServiceLine), [i64; BIN_COUNT]> = BTreeMap::new();
    for (event, (month, service_line)) in resolved_events(events, &context) {
        let bin = DelayBin::from_delay(event.report_delay_days);
        histograms
            .entry((month.clone(), *service_line))
            .or_default()[bin as usize] += 1;
    }

    histograms
        .into_iter()
        .flat_map(|((month, service_line), counts)| {
            DelayBin::ALL
                .iter()
                .zip(counts)
                .map(move |(&delay_bin, count)| DelayBinCount {
                    month: month.clone(),
                    service_line,
                    delay_bin,
                    bin_order: delay_bin.order(),
                    count,
                })
        })
        .collect()
}
