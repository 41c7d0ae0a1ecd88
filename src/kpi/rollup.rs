//! Site and chamber weekly KPI rollups.

use std::collections::BTreeMap;

use crate::aggregation::WeeklyAccumulator;
use crate::calendar::FiscalWeek;
use crate::types::{CeidKpiRow, ChronicScoreRecord, ClassifiedEvent, EntityKey, RunStamp, SiteKpiRow};

/// Latest chronic record per tool, by calculation timestamp. On ties the
/// record stored last wins.
pub fn latest_chronic_records(records: Vec<ChronicScoreRecord>) -> BTreeMap<EntityKey, ChronicScoreRecord> {
    let mut latest: BTreeMap<EntityKey, ChronicScoreRecord> = BTreeMap::new();
    for record in records {
        let key = record.aggregate.key();
        match latest.get(&key) {
            Some(current) if current.calculation_timestamp > record.calculation_timestamp => {}
            _ => {
                latest.insert(key, record);
            }
        }
    }
    latest
}

/// Weekly measures plus distinct and chronic tool counts for one group.
#[derive(Debug, Default)]
struct GroupAccumulator {
    weekly: WeeklyAccumulator,
    /// Tool name → flagged chronic under any of its keys in this group
    tools: BTreeMap<String, bool>,
}

impl GroupAccumulator {
    fn push(&mut self, e: &ClassifiedEvent, chronic: &BTreeMap<EntityKey, ChronicScoreRecord>) {
        self.weekly.push(e);
        if let Some(entity) = &e.event.entity {
            let flagged = e
                .event
                .entity_key()
                .and_then(|k| chronic.get(&k))
                .is_some_and(|r| r.chronic_flag);
            *self.tools.entry(entity.clone()).or_default() |= flagged;
        }
    }

    fn tool_counts(&self) -> (u32, u32, f64) {
        let total = u32::try_from(self.tools.len()).unwrap_or(u32::MAX);
        let chronic = u32::try_from(self.tools.values().filter(|c| **c).count()).unwrap_or(u32::MAX);
        let pct = if total == 0 {
            0.0
        } else {
            f64::from(chronic) / f64::from(total) * 100.0
        };
        (total, chronic, pct)
    }
}

/// Result of a rollup: rows plus events that lacked a grouping key.
#[derive(Debug, Default)]
pub struct Rollup<T> {
    pub rows: Vec<T>,
    pub skipped: usize,
}

/// One row per (facility, fiscal week).
pub fn site_rollup(
    events: &[ClassifiedEvent],
    chronic: &BTreeMap<EntityKey, ChronicScoreRecord>,
    stamp: &RunStamp,
) -> Rollup<SiteKpiRow> {
    let mut groups: BTreeMap<(String, FiscalWeek), GroupAccumulator> = BTreeMap::new();
    let mut skipped = 0;

    for e in events {
        match (&e.event.facility, e.fiscal_week()) {
            (Some(facility), Some(week)) => groups
                .entry((facility.clone(), week))
                .or_default()
                .push(e, chronic),
            _ => skipped += 1,
        }
    }

    let rows = groups
        .into_iter()
        .map(|((facility, week), acc)| {
            let (total_tools_count, chronic_tools_count, chronic_tools_pct) = acc.tool_counts();
            SiteKpiRow {
                facility,
                ww_year: week.year,
                ww_number: week.week,
                yearww: week.to_string(),
                measures: acc.weekly.finish(),
                total_tools_count,
                chronic_tools_count,
                chronic_tools_pct,
                rolling_4wk_avg_pm_life: None,
                rolling_4wk_pm_count: None,
                rolling_4wk_downtime_hours: None,
                calculation_timestamp: stamp.at,
                etl_run_id: stamp.run_id.clone(),
            }
        })
        .collect();

    Rollup { rows, skipped }
}

/// One row per (chamber, facility, population flag, fiscal week).
pub fn ceid_rollup(
    events: &[ClassifiedEvent],
    chronic: &BTreeMap<EntityKey, ChronicScoreRecord>,
    stamp: &RunStamp,
) -> Rollup<CeidKpiRow> {
    type CeidKey = (String, String, String, FiscalWeek);
    let mut groups: BTreeMap<CeidKey, GroupAccumulator> = BTreeMap::new();
    let mut skipped = 0;

    for e in events {
        match (&e.event.ceid, &e.event.facility, e.fiscal_week()) {
            (Some(ceid), Some(facility), Some(week)) => groups
                .entry((ceid.clone(), facility.clone(), e.event.altair_flag.clone(), week))
                .or_default()
                .push(e, chronic),
            _ => skipped += 1,
        }
    }

    let rows = groups
        .into_iter()
        .map(|((ceid, facility, altair_flag, week), acc)| {
            let (total_tools_count, chronic_tools_count, chronic_tools_pct) = acc.tool_counts();
            CeidKpiRow {
                ceid,
                facility,
                altair_flag,
                ww_year: week.year,
                ww_number: week.week,
                yearww: week.to_string(),
                measures: acc.weekly.finish(),
                total_tools_count,
                chronic_tools_count,
                chronic_tools_pct,
                calculation_timestamp: stamp.at,
                etl_run_id: stamp.run_id.clone(),
            }
        })
        .collect();

    Rollup { rows, skipped }
}
