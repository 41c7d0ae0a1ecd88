//! Part replacement summary per (part, tool, facility, chamber, week).

use chrono::NaiveDateTime;
use std::collections::BTreeMap;

use crate::aggregation::stats;
use crate::calendar::FiscalWeek;
use crate::types::{ClassifiedEvent, PartReplacementRow, RunStamp, TimingCategory};

type PartKey = (String, String, String, String, FiscalWeek);

#[derive(Debug, Default)]
struct PartAccumulator {
    count: u32,
    usage: Vec<f64>,
    first: Option<NaiveDateTime>,
    last: Option<NaiveDateTime>,
    early: u32,
    late: u32,
}

impl PartAccumulator {
    fn push(&mut self, e: &ClassifiedEvent) {
        self.count += 1;
        if let Some(usage) = e.event.custom_delta {
            self.usage.push(usage);
        }
        if let Some(ts) = e.event.txn_date {
            self.first = Some(self.first.map_or(ts, |f| f.min(ts)));
            self.last = Some(self.last.map_or(ts, |l| l.max(ts)));
        }
        match e.pm_timing_classification {
            TimingCategory::Early => self.early += 1,
            TimingCategory::Late | TimingCategory::Overdue => self.late += 1,
            TimingCategory::OnTime | TimingCategory::Unknown => {}
        }
    }
}

/// Events without a part name are not replacements and are ignored; events
/// with a part name but an incomplete key are counted as skipped.
pub fn build_part_summary(events: &[ClassifiedEvent], stamp: &RunStamp) -> (Vec<PartReplacementRow>, usize) {
    let mut groups: BTreeMap<PartKey, PartAccumulator> = BTreeMap::new();
    let mut skipped = 0;

    for e in events {
        let Some(part) = &e.event.attribute_name else {
            continue;
        };
        match (&e.event.entity, &e.event.facility, &e.event.ceid, e.fiscal_week()) {
            (Some(entity), Some(facility), Some(ceid), Some(week)) => groups
                .entry((part.clone(), entity.clone(), facility.clone(), ceid.clone(), week))
                .or_default()
                .push(e),
            _ => skipped += 1,
        }
    }

    let rows = groups
        .into_iter()
        .map(|((attribute_name, entity, facility, ceid, week), acc)| PartReplacementRow {
            attribute_name,
            entity,
            facility,
            ceid,
            ww_year: week.year,
            ww_number: week.week,
            yearww: week.to_string(),
            replacement_count: acc.count,
            avg_wafers_at_replacement: stats::mean(&acc.usage),
            median_wafers_at_replacement: stats::median(&acc.usage),
            min_wafers_at_replacement: stats::min(&acc.usage),
            max_wafers_at_replacement: stats::max(&acc.usage),
            part_life_std_dev: stats::sample_std_dev(&acc.usage),
            txn_span_days: acc.first.zip(acc.last).map(|(f, l)| (l - f).num_days()),
            early_replacement_count: acc.early,
            late_replacement_count: acc.late,
            calculation_timestamp: stamp.at,
            etl_run_id: stamp.run_id.clone(),
        })
        .collect();

    (rows, skipped)
}
