//! PM timing and scheduled/unscheduled classification.
//!
//! Pure row-level functions: no I/O, no logging, never fail. Missing inputs
//! map to the `Unknown` sentinel.

use crate::config::PmTimingConfig;
use crate::types::{ScheduledCategory, TimingCategory};

/// Actual minus target usage. `None` if either side is missing.
pub fn pm_life_deviation(actual: Option<f64>, target: Option<f64>) -> Option<f64> {
    Some(actual? - target?)
}

/// Deviation as a percentage of target.
///
/// Only defined for a strictly positive target.
pub fn pm_life_deviation_pct(actual: Option<f64>, target: Option<f64>) -> Option<f64> {
    let target = target.filter(|t| *t > 0.0)?;
    let deviation = pm_life_deviation(actual, Some(target))?;
    let pct = deviation / target * 100.0;
    pct.is_finite().then_some(pct)
}

/// Classify a percentage deviation against the timing thresholds.
///
/// Bands, evaluated in order:
/// - `pct < early` → Early
/// - `on_time_min <= pct <= on_time_max` → On-Time
/// - `late < pct <= overdue` → Late
/// - `pct > overdue` → Overdue
///
/// Values falling in a gap between bands (between `early` and `on_time_min`,
/// or between `on_time_max` and `late`) are On-Time.
pub fn classify_timing(pct: Option<f64>, thresholds: &PmTimingConfig) -> TimingCategory {
    let Some(pct) = pct.filter(|p| !p.is_nan()) else {
        return TimingCategory::Unknown;
    };

    if pct < thresholds.early_threshold {
        TimingCategory::Early
    } else if (thresholds.on_time_min..=thresholds.on_time_max).contains(&pct) {
        TimingCategory::OnTime
    } else if pct > thresholds.late_threshold && pct <= thresholds.overdue_threshold {
        TimingCategory::Late
    } else if pct > thresholds.overdue_threshold {
        TimingCategory::Overdue
    } else {
        TimingCategory::OnTime
    }
}

/// Classify the downtime type string.
///
/// Case-insensitive, surrounding whitespace ignored.
pub fn classify_scheduled(downtime_type: Option<&str>) -> ScheduledCategory {
    let Some(raw) = downtime_type else {
        return ScheduledCategory::Unknown;
    };
    let normalized = raw.trim();
    if normalized.eq_ignore_ascii_case("scheduled") {
        ScheduledCategory::Scheduled
    } else if normalized.eq_ignore_ascii_case("unscheduled") {
        ScheduledCategory::Unscheduled
    } else {
        ScheduledCategory::Unknown
    }
}
