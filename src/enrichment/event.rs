//! Row-level enrichment: raw `PmEvent` → `ClassifiedEvent`.

use crate::calendar::FiscalWeek;
use crate::classification::{classify_scheduled, classify_timing, pm_life_deviation, pm_life_deviation_pct};
use crate::config::PmTimingConfig;
use crate::types::{ClassifiedEvent, PmEvent, RunStamp};

const UNKNOWN: &str = "Unknown";

/// Number of critical fields the completeness score is computed over.
const CRITICAL_FIELDS: usize = 8;

/// Share of present critical fields × 100.
///
/// Critical fields: tool, facility, chamber, work week, transaction date,
/// downtime type, actual usage, target usage.
pub fn data_quality_score(e: &PmEvent) -> f64 {
    let present = [
        e.entity.is_some(),
        e.facility.is_some(),
        e.ceid.is_some(),
        e.yearww.is_some(),
        e.txn_date.is_some(),
        e.downtime_type.is_some(),
        e.custom_delta.is_some(),
        e.median_delta.is_some(),
    ]
    .iter()
    .filter(|p| **p)
    .count();
    #[allow(clippy::cast_precision_loss)]
    let score = present as f64 / CRITICAL_FIELDS as f64 * 100.0;
    score
}

/// `"<type> - <class>"`, each side `Unknown` when null.
pub fn downtime_category(e: &PmEvent) -> String {
    format!(
        "{} - {}",
        e.downtime_type.as_deref().unwrap_or(UNKNOWN),
        e.downtime_class.as_deref().unwrap_or(UNKNOWN)
    )
}

/// Deep-dive reason, falling back to the subclass details.
pub fn downtime_primary_reason(e: &PmEvent) -> Option<String> {
    e.pm_reason_deepdive
        .clone()
        .or_else(|| e.downtime_subclass_details.clone())
}

fn flag(value: Option<bool>) -> u8 {
    u8::from(value == Some(true))
}

/// Derive every classified field for one event. Never fails: unparseable
/// week strings leave the fiscal fields null.
pub fn classify_event(event: PmEvent, timing: &PmTimingConfig, stamp: &RunStamp) -> ClassifiedEvent {
    let week: Option<FiscalWeek> = event.yearww.as_deref().and_then(|s| s.parse().ok());
    let deviation = pm_life_deviation(event.custom_delta, event.median_delta);
    let deviation_pct = pm_life_deviation_pct(event.custom_delta, event.median_delta);
    let scheduled = classify_scheduled(event.downtime_type.as_deref());

    ClassifiedEvent {
        ww_year: week.map(|w| w.year),
        ww_number: week.map(|w| w.week),
        fiscal_quarter: week.map(|w| w.quarter()),
        fiscal_month: week.map(|w| w.month()),
        pm_life_vs_target: deviation,
        pm_life_vs_target_pct: deviation_pct,
        pm_timing_classification: classify_timing(deviation_pct, timing),
        scheduled_flag: scheduled.flag(),
        scheduled_category: scheduled,
        pm_cycle_efficiency: event.pm_cycle_utilization,
        pm_duration_outlier_flag: flag(event.duration_outlier),
        reclean_event_flag: flag(event.reclean_label),
        sympathy_pm_flag: flag(event.sympathy_pm),
        downtime_category: downtime_category(&event),
        downtime_primary_reason: downtime_primary_reason(&event),
        data_quality_score: data_quality_score(&event),
        enrichment_timestamp: stamp.at,
        etl_run_id: stamp.run_id.clone(),
        event,
    }
}
