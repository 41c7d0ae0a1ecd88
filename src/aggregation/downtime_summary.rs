//! Weekly downtime summary per (facility, chamber, week, population flag).

use std::collections::BTreeMap;

use super::WeeklyAccumulator;
use crate::calendar::FiscalWeek;
use crate::types::{ClassifiedEvent, DowntimeSummaryRow, RunStamp};

type SummaryKey = (String, String, FiscalWeek, String);

/// Build summary rows. Events missing facility, chamber or a parseable week
/// are excluded; the count of excluded events is returned alongside.
pub fn build_downtime_summary(
    events: &[ClassifiedEvent],
    stamp: &RunStamp,
) -> (Vec<DowntimeSummaryRow>, usize) {
    let mut groups: BTreeMap<SummaryKey, WeeklyAccumulator> = BTreeMap::new();
    let mut skipped = 0;

    for e in events {
        let key = match (&e.event.facility, &e.event.ceid, e.fiscal_week()) {
            (Some(facility), Some(ceid), Some(week)) => {
                (facility.clone(), ceid.clone(), week, e.event.altair_flag.clone())
            }
            _ => {
                skipped += 1;
                continue;
            }
        };
        groups.entry(key).or_default().push(e);
    }

    let rows = groups
        .into_iter()
        .map(|((facility, ceid, week, altair_flag), acc)| {
            let measures = acc.finish();
            DowntimeSummaryRow {
                facility,
                ceid,
                ww_year: week.year,
                ww_number: week.week,
                yearww: week.to_string(),
                altair_flag,
                pm_life_variance: measures.pm_life_std_dev.map(|s| s * s),
                measures,
                calculation_timestamp: stamp.at,
                etl_run_id: stamp.run_id.clone(),
            }
        })
        .collect();

    (rows, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PmTimingConfig;
    use crate::enrichment::classify_event;
    use crate::types::PmEvent;
    use chrono::NaiveDate;

    fn stamp() -> RunStamp {
        RunStamp::at(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap())
    }

    fn event(id: &str, ceid: &str, week: &str, kind: &str, life: f64, hours: f64) -> ClassifiedEvent {
        let mut e = PmEvent::new(id);
        e.entity = Some("T1".into());
        e.facility = Some("F32".into());
        e.ceid = Some(ceid.into());
        e.yearww = Some(week.into());
        e.downtime_type = Some(kind.into());
        e.custom_delta = Some(life);
        e.median_delta = Some(1000.0);
        e.down_window_duration_hr = Some(hours);
        classify_event(e, &PmTimingConfig::default(), &stamp())
    }

    #[test]
    fn test_groups_and_split() {
        let events = vec![
            event("1", "ETCH", "2025WW10", "Scheduled", 1000.0, 4.0),
            event("2", "ETCH", "2025WW10", "Unscheduled", 700.0, 8.0),
            event("3", "ETCH", "2025WW10", "Scheduled", 1400.0, 0.0),
            event("4", "DEPO", "2025WW10", "Scheduled", 1000.0, 1.0),
            event("5", "ETCH", "2025WW11", "Scheduled", 1000.0, 1.0),
        ];
        let (rows, skipped) = build_downtime_summary(&events, &stamp());
        assert_eq!(skipped, 0);
        assert_eq!(rows.len(), 3);

        let etch = rows
            .iter()
            .find(|r| r.ceid == "ETCH" && r.ww_number == 10)
            .unwrap();
        let m = &etch.measures;
        assert_eq!(etch.yearww, "2025WW10");
        assert_eq!(etch.altair_flag, "UNKNOWN");
        assert_eq!(m.total_pm_events, 3);
        assert_eq!(m.scheduled_pm_count, 2);
        assert_eq!(m.unscheduled_pm_count, 1);
        assert_eq!(m.early_pm_count, 1);
        assert_eq!(m.on_time_pm_count, 1);
        assert_eq!(m.overdue_pm_count, 1);
        assert_eq!(m.total_downtime_hours, 12.0);
        assert_eq!(m.median_pm_life, Some(1000.0));
        assert!((m.scheduled_downtime_hours - 8.0).abs() < 1e-9);
        assert!((m.unscheduled_downtime_hours - 4.0).abs() < 1e-9);
        let std = m.pm_life_std_dev.unwrap();
        assert!((etch.pm_life_variance.unwrap() - std * std).abs() < 1e-9);
    }

    #[test]
    fn test_unparseable_week_is_skipped() {
        let events = vec![event("1", "ETCH", "bad", "Scheduled", 1000.0, 1.0)];
        let (rows, skipped) = build_downtime_summary(&events, &stamp());
        assert!(rows.is_empty());
        assert_eq!(skipped, 1);
    }
}
