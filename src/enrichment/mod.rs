//! Enrichment orchestrator (bronze → silver)
//!
//! One run:
//! 1. fetch raw events (date filter, optional anti-join on enriched ids)
//! 2. classify every event and append to `pm_flex_enriched`
//! 3. weekly downtime summary → `pm_flex_downtime_summary`
//! 4. per-tool aggregation and chronic scoring over the full enriched
//!    history of every tool the batch touched → `pm_flex_chronic_tools`
//! 5. populate `DimDate` when it is empty
//!
//! An empty batch is a successful run with status `NoData`.

mod event;

pub use event::{classify_event, data_quality_score, downtime_category, downtime_primary_reason};

use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::aggregation::{aggregate_entities, build_downtime_summary};
use crate::calendar::{generate_dim_date, CalendarError, FiscalCalendar};
use crate::classification::{AnalysisWindow, CategoryDistribution, ChronicScorer};
use crate::config::PmFlexConfig;
use crate::ingest::quality::{tracked_fields, NullReport};
use crate::ingest::{fetch_raw_events, EventFilter, IngestError};
use crate::storage::{StorageError, Table, TableStore, TableStoreExt};
use crate::types::{ClassifiedEvent, EntityKey, RunStamp, RunStatus};

#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    #[error("failed to read raw events: {0}")]
    Ingest(#[from] IngestError),

    #[error("failed to write enrichment output: {0}")]
    Storage(#[from] StorageError),

    #[error("date dimension generation failed: {0}")]
    Calendar(#[from] CalendarError),
}

/// Counts from one enrichment run.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentStats {
    pub run_id: String,
    pub rows_processed: usize,
    pub enriched_rows_loaded: usize,
    pub summary_rows_created: usize,
    pub chronic_tools_analyzed: usize,
    pub chronic_tools_flagged: usize,
    pub dim_date_rows: usize,
    pub elapsed: Duration,
    pub status: RunStatus,
}

impl EnrichmentStats {
    fn no_data(stamp: &RunStamp, elapsed: Duration) -> Self {
        Self {
            run_id: stamp.run_id.clone(),
            rows_processed: 0,
            enriched_rows_loaded: 0,
            summary_rows_created: 0,
            chronic_tools_analyzed: 0,
            chronic_tools_flagged: 0,
            dim_date_rows: 0,
            elapsed,
            status: RunStatus::NoData,
        }
    }
}

/// Min and max transaction date of a batch.
pub fn analysis_window(events: &[ClassifiedEvent]) -> AnalysisWindow {
    let dates = events.iter().filter_map(|e| e.event.txn_date.map(|t| t.date()));
    let (start, end) = dates.fold((None::<NaiveDate>, None::<NaiveDate>), |(lo, hi), d| {
        (
            Some(lo.map_or(d, |lo| lo.min(d))),
            Some(hi.map_or(d, |hi| hi.max(d))),
        )
    });
    AnalysisWindow { start, end }
}

pub struct Enricher<'a> {
    store: &'a dyn TableStore,
    config: &'a PmFlexConfig,
    calendar: &'a dyn FiscalCalendar,
}

impl<'a> Enricher<'a> {
    pub fn new(store: &'a dyn TableStore, config: &'a PmFlexConfig, calendar: &'a dyn FiscalCalendar) -> Self {
        Self { store, config, calendar }
    }

    /// Clear the three tables this stage owns.
    pub fn reset_outputs(&self) -> Result<(), StorageError> {
        for table in [Table::Enriched, Table::DowntimeSummary, Table::ChronicTools] {
            self.store.clear(table)?;
            info!(table = %table, "Cleared");
        }
        Ok(())
    }

    pub fn run(&self, filter: &EventFilter, stamp: &RunStamp) -> Result<EnrichmentStats, EnrichmentError> {
        let started = Instant::now();
        info!(run_id = %stamp.run_id, backend = self.store.backend_name(), "Enrichment started");

        let events = fetch_raw_events(self.store, filter)?;
        if events.is_empty() {
            info!(run_id = %stamp.run_id, "No new events to enrich");
            return Ok(EnrichmentStats::no_data(stamp, started.elapsed()));
        }
        let rows_processed = events.len();

        NullReport::profile(&events, &tracked_fields())
            .warn_exceeding(self.config.data_quality.max_null_pct, "enrichment");

        let classified: Vec<ClassifiedEvent> = events
            .into_iter()
            .map(|e| classify_event(e, &self.config.pm_timing, stamp))
            .collect();
        CategoryDistribution::from_events(&classified).log();

        let enriched_rows_loaded = self.store.append_rows(Table::Enriched, &classified)?;
        info!(rows = enriched_rows_loaded, "Enriched events written");

        let (summary, skipped) = build_downtime_summary(&classified, stamp);
        if skipped > 0 {
            warn!(skipped, "Events without facility, chamber or parseable week left out of downtime summary");
        }
        let summary_rows_created = self.store.append_rows(Table::DowntimeSummary, &summary)?;
        info!(rows = summary_rows_created, "Downtime summary written");

        let touched: BTreeSet<EntityKey> = classified.iter().filter_map(|e| e.event.entity_key()).collect();
        let unidentified = classified.iter().filter(|e| e.event.entity_key().is_none()).count();
        if unidentified > 0 {
            warn!(skipped = unidentified, "Events without a complete tool identity left out of chronic scoring");
        }
        let history = self.enriched_history(&touched)?;
        info!(tools = touched.len(), events = history.len(), "Scoring chronic tools over enriched history");

        let aggregation = aggregate_entities(&history);
        let window = analysis_window(&history);
        let records = ChronicScorer::new(&self.config.chronic_tools).score_all(
            aggregation.aggregates,
            window,
            stamp.at,
            &stamp.run_id,
        );
        let chronic_tools_flagged = records.iter().filter(|r| r.chronic_flag).count();
        let chronic_tools_analyzed = self.store.append_rows(Table::ChronicTools, &records)?;

        let dim_date_rows = self.populate_dim_date(stamp.at.date())?;

        let elapsed = started.elapsed();
        info!(
            run_id = %stamp.run_id,
            rows_processed,
            chronic_tools_analyzed,
            chronic_tools_flagged,
            "Enrichment complete in {:.2}s",
            elapsed.as_secs_f64()
        );

        Ok(EnrichmentStats {
            run_id: stamp.run_id.clone(),
            rows_processed,
            enriched_rows_loaded,
            summary_rows_created,
            chronic_tools_analyzed,
            chronic_tools_flagged,
            dim_date_rows,
            elapsed,
            status: RunStatus::Success,
        })
    }

    /// Every stored enriched event belonging to one of `keys`, including
    /// rows appended by the current run.
    fn enriched_history(&self, keys: &BTreeSet<EntityKey>) -> Result<Vec<ClassifiedEvent>, StorageError> {
        let enriched: Vec<ClassifiedEvent> = self.store.fetch_rows(Table::Enriched)?;
        Ok(enriched
            .into_iter()
            .filter(|e| e.event.entity_key().is_some_and(|k| keys.contains(&k)))
            .collect())
    }

    /// Generate the date dimension around `today`'s fiscal year. No-op when
    /// the dimension already has rows.
    pub fn populate_dim_date(&self, today: NaiveDate) -> Result<usize, EnrichmentError> {
        let existing = self.store.count(Table::DimDate)?;
        if existing > 0 {
            info!(rows = existing, "DimDate already populated");
            return Ok(0);
        }

        let current_year = self.calendar.week_of(today)?.year;
        let start_year = current_year - self.config.calendar.years_before;
        let rows = generate_dim_date(self.calendar, start_year, self.config.calendar.num_years)?;
        let written = self.store.append_rows(Table::DimDate, &rows)?;
        info!(
            rows = written,
            "DimDate populated: {} fiscal years from FY{start_year}",
            self.config.calendar.num_years
        );
        Ok(written)
    }
}
