//! Batch pipeline runner
//!
//! ```text
//! STAGE 1: Load     CSV export            → pm_flex_raw            (bronze)
//! STAGE 2: Enrich   pm_flex_raw           → enriched, downtime summary,
//!                                           chronic tools, DimDate  (silver)
//! STAGE 3: KPI      pm_flex_enriched      → site/chamber KPIs, part summary,
//!                                           chronic history         (gold)
//! ```
//!
//! Each stage consumes the complete output of the one before it. A failed
//! stage aborts the run; re-running picks up where the anti-joins leave off.

use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::calendar::FiscalCalendar;
use crate::config::{ConfigError, PmFlexConfig};
use crate::enrichment::{Enricher, EnrichmentError, EnrichmentStats};
use crate::ingest::{EventFilter, IngestError, LoadStats, PopulationFlags, RawLoader};
use crate::kpi::{KpiEngine, KpiError, KpiStats, WeekRange};
use crate::storage::{StorageError, Table, TableStore};
use crate::types::RunStamp;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("load stage failed: {0}")]
    Ingest(#[from] IngestError),

    #[error("enrichment stage failed: {0}")]
    Enrichment(#[from] EnrichmentError),

    #[error("KPI stage failed: {0}")]
    Kpi(#[from] KpiError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// What one pipeline run should do.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Export to load before enriching; `None` processes what is already stored
    pub csv: Option<PathBuf>,
    /// Optional `ENTITY,ProcessAllowed` side file
    pub population_flags: Option<PathBuf>,
    pub event_filter: EventFilter,
    pub week_range: WeekRange,
    /// Clear every derived table and reprocess all raw events
    pub full: bool,
}

impl Default for PipelineOptions {
    /// Incremental run over whatever is stored.
    fn default() -> Self {
        Self {
            csv: None,
            population_flags: None,
            event_filter: EventFilter::incremental(),
            week_range: WeekRange::default(),
            full: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub run_id: String,
    pub load: Option<LoadStats>,
    pub enrichment: EnrichmentStats,
    pub kpi: KpiStats,
    pub elapsed: Duration,
}

pub struct Pipeline<'a> {
    store: &'a dyn TableStore,
    config: &'a PmFlexConfig,
    calendar: &'a dyn FiscalCalendar,
}

impl<'a> Pipeline<'a> {
    pub fn new(store: &'a dyn TableStore, config: &'a PmFlexConfig, calendar: &'a dyn FiscalCalendar) -> Self {
        Self { store, config, calendar }
    }

    /// Clear every table derived from the raw table.
    pub fn reset_derived(&self) -> Result<(), StorageError> {
        for table in Table::DERIVED {
            self.store.clear(table)?;
        }
        warn!(tables = Table::DERIVED.len(), "Derived tables cleared for full reprocessing");
        Ok(())
    }

    /// Stage 1 alone.
    pub fn load(&self, csv: &std::path::Path, population_flags: Option<&std::path::Path>) -> Result<LoadStats, PipelineError> {
        let flags = population_flags.map(PopulationFlags::load).transpose()?;
        let mut loader = RawLoader::new(self.store).with_max_null_pct(self.config.data_quality.max_null_pct);
        if let Some(flags) = &flags {
            loader = loader.with_population_flags(flags);
        }
        Ok(loader.load_csv(csv)?)
    }

    pub fn run(&self, options: &PipelineOptions, stamp: &RunStamp) -> Result<PipelineReport, PipelineError> {
        let started = Instant::now();
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("  PM Flex pipeline run {}", stamp.run_id);
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if options.full {
            self.reset_derived()?;
        }

        let load = match &options.csv {
            Some(csv) => {
                info!("STAGE 1: load {}", csv.display());
                Some(self.load(csv, options.population_flags.as_deref())?)
            }
            None => {
                info!("STAGE 1: skipped (no export given)");
                None
            }
        };

        info!("STAGE 2: enrichment");
        let filter = EventFilter {
            incremental: options.event_filter.incremental && !options.full,
            ..options.event_filter.clone()
        };
        let enrichment = Enricher::new(self.store, self.config, self.calendar).run(&filter, stamp)?;

        info!("STAGE 3: KPI rollup");
        let kpi = KpiEngine::new(self.store).run(&options.week_range, !options.full, stamp)?;

        self.store.flush()?;
        let elapsed = started.elapsed();
        info!(
            run_id = %stamp.run_id,
            enrichment = %enrichment.status,
            kpi = %kpi.status,
            "Pipeline complete in {:.2}s",
            elapsed.as_secs_f64()
        );

        Ok(PipelineReport {
            run_id: stamp.run_id.clone(),
            load,
            enrichment,
            kpi,
            elapsed,
        })
    }
}
