//! Weekly chronic status snapshots.
//!
//! For every fiscal week in a KPI batch, each tool's latest chronic record
//! is written as a history row. Score change and status change are measured
//! against the most recent earlier snapshot of the same tool, whether stored
//! or produced earlier in the same batch.

use std::collections::{BTreeMap, BTreeSet};

use crate::calendar::FiscalWeek;
use crate::config::defaults::UNKNOWN_POPULATION_FLAG;
use crate::types::{ChronicHistoryRow, ChronicScoreRecord, ClassifiedEvent, EntityKey, RunStamp};

#[derive(Debug, Clone, Copy)]
struct Snapshot {
    week: FiscalWeek,
    score: f64,
    flag: bool,
}

/// Population flag per tool, taken from the batch's latest-dated event.
fn population_flags(events: &[ClassifiedEvent]) -> BTreeMap<EntityKey, String> {
    let mut latest: BTreeMap<EntityKey, (Option<chrono::NaiveDateTime>, String)> = BTreeMap::new();
    for e in events {
        let Some(key) = e.event.entity_key() else {
            continue;
        };
        let candidate = (e.event.txn_date, e.event.altair_flag.clone());
        match latest.get(&key) {
            Some((ts, _)) if *ts > candidate.0 => {}
            _ => {
                latest.insert(key, candidate);
            }
        }
    }
    latest.into_iter().map(|(k, (_, flag))| (k, flag)).collect()
}

fn previous_snapshots(history: &[ChronicHistoryRow]) -> BTreeMap<EntityKey, Snapshot> {
    let mut previous: BTreeMap<EntityKey, Snapshot> = BTreeMap::new();
    for row in history {
        let key = EntityKey {
            entity: row.entity.clone(),
            facility: row.facility.clone(),
            ceid: row.ceid.clone(),
        };
        let snapshot = Snapshot {
            week: row.fiscal_week(),
            score: row.chronic_score,
            flag: row.chronic_flag,
        };
        match previous.get(&key) {
            Some(existing) if existing.week > snapshot.week => {}
            _ => {
                previous.insert(key, snapshot);
            }
        }
    }
    previous
}

/// History rows for `weeks` × `latest` records.
pub fn build_chronic_history(
    weeks: &BTreeSet<FiscalWeek>,
    latest: &BTreeMap<EntityKey, ChronicScoreRecord>,
    events: &[ClassifiedEvent],
    history: &[ChronicHistoryRow],
    stamp: &RunStamp,
) -> Vec<ChronicHistoryRow> {
    let flags = population_flags(events);
    let mut previous = previous_snapshots(history);
    let mut rows = Vec::with_capacity(weeks.len() * latest.len());

    for &week in weeks {
        for (key, record) in latest {
            let prior = previous.get(key).filter(|p| p.week < week);
            let agg = &record.aggregate;
            rows.push(ChronicHistoryRow {
                entity: key.entity.clone(),
                facility: key.facility.clone(),
                ceid: key.ceid.clone(),
                altair_flag: flags
                    .get(key)
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN_POPULATION_FLAG.to_string()),
                ww_year: week.year,
                ww_number: week.week,
                yearww: week.to_string(),
                chronic_flag: record.chronic_flag,
                chronic_score: record.chronic_score,
                chronic_severity: record.chronic_severity,
                unscheduled_pm_count: agg.unscheduled_pm_count,
                unscheduled_pm_rate: agg.unscheduled_pm_rate,
                pm_life_variance: agg.pm_life_variance,
                total_downtime_hours: agg.total_downtime_hours,
                chronic_score_change: prior.map_or(0.0, |p| record.chronic_score - p.score),
                status_changed: prior.is_some_and(|p| p.flag != record.chronic_flag),
                calculation_timestamp: stamp.at,
                etl_run_id: stamp.run_id.clone(),
            });
            previous.insert(
                key.clone(),
                Snapshot {
                    week,
                    score: record.chronic_score,
                    flag: record.chronic_flag,
                },
            );
        }
    }
    rows
}
