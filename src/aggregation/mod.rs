//! Group-wise aggregation of classified events
//!
//! Every grouping is an explicit fold into a `BTreeMap<Key, Accumulator>`,
//! so output is sorted by key and independent of input order.
//!
//! - `entity`: per-tool statistics feeding the chronic scorer
//! - `downtime_summary`: weekly downtime rows per facility/chamber/population
//! - `weekly`: the measures every weekly grain shares
//! - `stats`: NaN-free descriptive statistics over `statrs`

pub mod downtime_summary;
pub mod entity;
pub mod stats;
pub mod weekly;

pub use downtime_summary::build_downtime_summary;
pub use entity::{aggregate_entities, EntityAggregation};
pub use weekly::WeeklyAccumulator;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PmTimingConfig;
    use crate::enrichment::classify_event;
    use crate::types::{ClassifiedEvent, PmEvent, RunStamp};
    use chrono::NaiveDate;

    fn event(id: &str, day: u32, target: Option<f64>, kind: &str) -> ClassifiedEvent {
        let mut e = PmEvent::new(id);
        e.txn_date = NaiveDate::from_ymd_opt(2025, 3, day).and_then(|d| d.and_hms_opt(0, 0, 0));
        e.custom_delta = Some(1000.0);
        e.median_delta = target;
        e.downtime_type = Some(kind.into());
        let at = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        classify_event(e, &PmTimingConfig::default(), &RunStamp::at(at))
    }

    #[test]
    fn test_target_is_first_by_date_regardless_of_push_order() {
        let mut acc = WeeklyAccumulator::default();
        acc.push(&event("b", 12, Some(1200.0), "Scheduled"));
        acc.push(&event("c", 10, None, "Scheduled"));
        acc.push(&event("a", 11, Some(1100.0), "Scheduled"));
        assert_eq!(acc.finish().target_pm_life, Some(1100.0));
    }

    #[test]
    fn test_missing_downtime_excluded_from_average() {
        let mut acc = WeeklyAccumulator::default();
        let mut with_hours = event("a", 1, Some(1000.0), "Scheduled");
        with_hours.event.down_window_duration_hr = Some(6.0);
        acc.push(&with_hours);
        acc.push(&event("b", 2, Some(1000.0), "Unscheduled"));

        let m = acc.finish();
        assert_eq!(m.total_downtime_hours, 6.0);
        assert_eq!(m.avg_downtime_hours, Some(6.0));
        assert_eq!(m.unscheduled_pm_rate, 0.5);
        assert_eq!(m.scheduled_downtime_hours, 3.0);
        assert_eq!(m.unscheduled_downtime_hours, 3.0);
    }

    #[test]
    fn test_unknown_timing_counts_toward_total_only() {
        let mut acc = WeeklyAccumulator::default();
        acc.push(&event("a", 1, None, "Scheduled"));
        let m = acc.finish();
        assert_eq!(m.total_pm_events, 1);
        assert_eq!(
            m.early_pm_count + m.on_time_pm_count + m.late_pm_count + m.overdue_pm_count,
            0
        );
        assert_eq!(m.on_time_pm_rate, 0.0);
    }
}
