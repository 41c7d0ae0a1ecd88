//! KPI rollup engine (silver → gold)
//!
//! Reads enriched events, rolls them up per site and per chamber for each
//! fiscal week, backfills the site-level rolling statistics, and writes the
//! part replacement summary and chronic history.
//!
//! Incremental runs skip (facility, week) pairs that already have a site
//! row, so re-running without new input writes nothing.

pub mod chronic_history;
pub mod part_summary;
pub mod rollup;
pub mod rolling;

pub use chronic_history::build_chronic_history;
pub use part_summary::build_part_summary;
pub use rollup::{ceid_rollup, latest_chronic_records, site_rollup};
pub use rolling::{apply_rolling, RollingWindow};

use std::collections::{BTreeSet, HashSet};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::calendar::FiscalWeek;
use crate::storage::{StorageError, Table, TableStore, TableStoreExt};
use crate::types::{
    ChronicHistoryRow, ChronicScoreRecord, ClassifiedEvent, RunStamp, RunStatus, SiteKpiRow,
};

#[derive(Debug, thiserror::Error)]
pub enum KpiError {
    #[error("KPI storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid week range: {start} is after {end}")]
    InvalidRange { start: FiscalWeek, end: FiscalWeek },
}

/// Inclusive fiscal-week bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeekRange {
    pub start: Option<FiscalWeek>,
    pub end: Option<FiscalWeek>,
}

impl WeekRange {
    pub fn new(start: Option<FiscalWeek>, end: Option<FiscalWeek>) -> Result<Self, KpiError> {
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(KpiError::InvalidRange { start, end });
            }
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, week: FiscalWeek) -> bool {
        self.start.map_or(true, |s| week >= s) && self.end.map_or(true, |e| week <= e)
    }
}

/// Counts from one KPI run.
#[derive(Debug, Clone, PartialEq)]
pub struct KpiStats {
    pub run_id: String,
    pub events_considered: usize,
    pub site_rows: usize,
    pub ceid_rows: usize,
    pub rolling_rows_updated: usize,
    pub part_rows: usize,
    pub history_rows: usize,
    pub elapsed: Duration,
    pub status: RunStatus,
}

pub struct KpiEngine<'a> {
    store: &'a dyn TableStore,
}

impl<'a> KpiEngine<'a> {
    pub fn new(store: &'a dyn TableStore) -> Self {
        Self { store }
    }

    /// Clear every table this stage owns.
    pub fn reset_outputs(&self) -> Result<(), StorageError> {
        for table in [
            Table::SiteKpis,
            Table::CeidKpis,
            Table::PartReplacement,
            Table::ChronicHistory,
        ] {
            self.store.clear(table)?;
            info!(table = %table, "Cleared");
        }
        Ok(())
    }

    /// Enriched events in `range` whose (facility, week) has no site row yet.
    fn load_batch(&self, range: &WeekRange, incremental: bool) -> Result<Vec<ClassifiedEvent>, KpiError> {
        let enriched: Vec<ClassifiedEvent> = self.store.fetch_rows(Table::Enriched)?;
        let total = enriched.len();

        let done: HashSet<(String, FiscalWeek)> = if incremental {
            self.store
                .fetch_rows::<SiteKpiRow>(Table::SiteKpis)?
                .into_iter()
                .map(|r| {
                    let week = r.fiscal_week();
                    (r.facility, week)
                })
                .collect()
        } else {
            HashSet::new()
        };

        let batch: Vec<ClassifiedEvent> = enriched
            .into_iter()
            .filter(|e| e.fiscal_week().is_some_and(|w| range.contains(w)))
            .filter(|e| match (&e.event.facility, e.fiscal_week()) {
                (Some(facility), Some(week)) => !done.contains(&(facility.clone(), week)),
                _ => true,
            })
            .collect();

        info!(
            total,
            selected = batch.len(),
            weeks_already_rolled_up = done.len(),
            "Loaded enriched events for KPI rollup"
        );
        Ok(batch)
    }

    pub fn run(&self, range: &WeekRange, incremental: bool, stamp: &RunStamp) -> Result<KpiStats, KpiError> {
        let started = Instant::now();
        info!(run_id = %stamp.run_id, backend = self.store.backend_name(), "KPI rollup started");

        let events = self.load_batch(range, incremental)?;
        if events.is_empty() {
            info!(run_id = %stamp.run_id, "No new enriched events for KPI rollup");
            return Ok(KpiStats {
                run_id: stamp.run_id.clone(),
                events_considered: 0,
                site_rows: 0,
                ceid_rows: 0,
                rolling_rows_updated: 0,
                part_rows: 0,
                history_rows: 0,
                elapsed: started.elapsed(),
                status: RunStatus::NoData,
            });
        }

        let records: Vec<ChronicScoreRecord> = self.store.fetch_rows(Table::ChronicTools)?;
        if records.is_empty() {
            warn!("No chronic tool records stored; chronic counts will be zero");
        }
        let latest = latest_chronic_records(records);

        let site = site_rollup(&events, &latest, stamp);
        if site.skipped > 0 {
            warn!(skipped = site.skipped, "Events without facility left out of site KPIs");
        }
        let site_rows = self.store.append_rows(Table::SiteKpis, &site.rows)?;

        let ceid = ceid_rollup(&events, &latest, stamp);
        if ceid.skipped > 0 {
            warn!(skipped = ceid.skipped, "Events without chamber or facility left out of chamber KPIs");
        }
        let ceid_rows = self.store.append_rows(Table::CeidKpis, &ceid.rows)?;

        let rolling_rows_updated = self.update_rolling()?;

        let (parts, part_skipped) = build_part_summary(&events, stamp);
        if part_skipped > 0 {
            warn!(skipped = part_skipped, "Part replacements without a complete key left out of part summary");
        }
        let part_rows = self.store.append_rows(Table::PartReplacement, &parts)?;

        let weeks: BTreeSet<FiscalWeek> = events.iter().filter_map(ClassifiedEvent::fiscal_week).collect();
        let stored_history: Vec<ChronicHistoryRow> = self.store.fetch_rows(Table::ChronicHistory)?;
        let history = build_chronic_history(&weeks, &latest, &events, &stored_history, stamp);
        let history_rows = self.store.append_rows(Table::ChronicHistory, &history)?;

        let elapsed = started.elapsed();
        info!(
            run_id = %stamp.run_id,
            site_rows,
            ceid_rows,
            part_rows,
            history_rows,
            "KPI rollup complete in {:.2}s",
            elapsed.as_secs_f64()
        );

        Ok(KpiStats {
            run_id: stamp.run_id.clone(),
            events_considered: events.len(),
            site_rows,
            ceid_rows,
            rolling_rows_updated,
            part_rows,
            history_rows,
            elapsed,
            status: RunStatus::Success,
        })
    }

    /// Recompute the rolling columns over the whole site table and rewrite it.
    pub fn update_rolling(&self) -> Result<usize, KpiError> {
        let rows: Vec<SiteKpiRow> = self.store.fetch_rows(Table::SiteKpis)?;
        if rows.is_empty() {
            return Ok(0);
        }
        let updated = apply_rolling(rows);
        let written = self.store.overwrite_rows(Table::SiteKpis, &updated)?;
        info!(rows = written, "Rolling 4-week statistics updated");
        Ok(written)
    }
}
