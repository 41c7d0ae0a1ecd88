//! PM Flex - preventive maintenance fleet health pipeline
//!
//! Batch CLI over the PM Flex engine: loads weekly exports, enriches events,
//! scores chronic tools and rolls up weekly KPIs into an embedded table store.
//!
//! # Usage
//!
//! ```bash
//! # Load this week's export, enrich and roll up
//! pm-flex run --csv /drops/2025WW22/PM_Flex.csv
//!
//! # Load the newest export found under a drop folder
//! pm-flex load --drop-root /drops
//!
//! # Reprocess everything from the raw table
//! pm-flex run --full
//!
//! # Check a config file without running anything
//! pm-flex validate-config ./pm_flex.toml
//! ```
//!
//! # Environment Variables
//!
//! - `PM_FLEX_CONFIG`: Path to the TOML config (default: `./pm_flex.toml`, then built-ins)
//! - `PM_FLEX_DATA_DIR`: Table store directory (overrides `storage.data_dir`)
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use pm_flex::calendar::{FiscalCalendar, FiscalWeek, IntelCalendar};
use pm_flex::config::{self, validation, PmFlexConfig};
use pm_flex::enrichment::Enricher;
use pm_flex::ingest::discovery::DEFAULT_MAX_WEEKS_BACK;
use pm_flex::ingest::{EventFilter, WeeklyDrop};
use pm_flex::kpi::{KpiEngine, WeekRange};
use pm_flex::pipeline::{Pipeline, PipelineOptions};
use pm_flex::storage::{SledStore, Table, TableStore};
use pm_flex::types::RunStamp;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "pm-flex")]
#[command(about = "PM Flex enrichment, chronic tool scoring and KPI rollups")]
#[command(version)]
struct CliArgs {
    /// Config file (overrides the PM_FLEX_CONFIG / ./pm_flex.toml search)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Table store directory
    #[arg(long, global = true, env = "PM_FLEX_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Load a PM Flex export into the raw table
    Load {
        /// Export file to load
        #[arg(long, conflicts_with = "drop_root")]
        csv: Option<PathBuf>,

        /// Weekly drop folder root (<root>/<YYYYWWnn>/PM_Flex.csv)
        #[arg(long)]
        drop_root: Option<PathBuf>,

        /// Week to load from the drop root (default: newest within --weeks-back)
        #[arg(long, requires = "drop_root")]
        week: Option<FiscalWeek>,

        /// How many weeks back to look for the newest export
        #[arg(long, default_value_t = DEFAULT_MAX_WEEKS_BACK)]
        weeks_back: u32,

        /// ENTITY,ProcessAllowed side file with tool population flags
        #[arg(long)]
        population: Option<PathBuf>,
    },

    /// Enrich raw events (silver layer)
    Enrich {
        /// First transaction date to include (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Transaction date to stop before (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Clear enrichment outputs and reprocess every raw event
        #[arg(long, conflicts_with_all = ["start", "end"])]
        full: bool,
    },

    /// Roll enriched events up into KPI tables (gold layer)
    Kpi {
        /// First fiscal week to include (e.g. 2025WW20)
        #[arg(long)]
        start_ww: Option<FiscalWeek>,

        /// Last fiscal week to include
        #[arg(long)]
        end_ww: Option<FiscalWeek>,

        /// Clear KPI tables and recompute from every enriched event
        #[arg(long, conflicts_with_all = ["start_ww", "end_ww"])]
        full: bool,
    },

    /// Load (optional), enrich and roll up in one go
    Run {
        #[arg(long)]
        csv: Option<PathBuf>,

        #[arg(long, requires = "csv")]
        population: Option<PathBuf>,

        /// Clear every derived table first
        #[arg(long)]
        full: bool,
    },

    /// Validate a config file and print the effective settings
    ValidateConfig {
        /// File to check (default: the normal search order)
        path: Option<PathBuf>,
    },

    /// Show the fiscal week of a date (default: today)
    Week { date: Option<NaiveDate> },

    /// List weeks with an export under a drop folder
    Weeks { drop_root: PathBuf },

    /// Row counts per table and store size on disk
    Status,

    /// Clear derived tables (raw and DimDate are kept unless --all)
    Reset {
        #[arg(long)]
        all: bool,
    },
}

// ============================================================================
// Setup
// ============================================================================

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

fn load_config(path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<&'static PmFlexConfig> {
    let mut cfg = match path {
        Some(path) => PmFlexConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PmFlexConfig::load().context("Failed to load PM Flex config")?,
    };
    if let Some(dir) = data_dir {
        cfg.storage.data_dir = dir;
    }
    config::init(cfg);
    Ok(config::get()?)
}

fn open_store(cfg: &PmFlexConfig) -> Result<SledStore> {
    let dir = &cfg.storage.data_dir;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
    SledStore::open(dir).with_context(|| format!("Failed to open table store at {}", dir.display()))
}

// ============================================================================
// Commands
// ============================================================================

fn resolve_export(
    csv: Option<PathBuf>,
    drop_root: Option<PathBuf>,
    week: Option<FiscalWeek>,
    weeks_back: u32,
    calendar: &dyn FiscalCalendar,
) -> Result<PathBuf> {
    if let Some(csv) = csv {
        return Ok(csv);
    }
    let Some(root) = drop_root else {
        bail!("either --csv or --drop-root is required");
    };
    let drop = WeeklyDrop::new(root, calendar);
    match week {
        Some(week) => drop
            .find_file_for_week(week)
            .with_context(|| format!("No export for {week} under {}", drop.root().display())),
        None => {
            let (_, path) = drop.find_latest_file(Local::now().date_naive(), weeks_back)?;
            Ok(path)
        }
    }
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let cfg = match path {
        Some(p) => PmFlexConfig::load_from_file(p)?,
        None => PmFlexConfig::load()?,
    };
    let warnings = validation::validate_ranges(&cfg);
    for w in &warnings {
        warn!("{w}");
    }
    println!("{}", cfg.to_toml()?);
    info!(warnings = warnings.len(), "Config is valid");
    Ok(())
}

fn show_week(date: Option<NaiveDate>, calendar: &dyn FiscalCalendar) -> Result<()> {
    let date = date.unwrap_or_else(|| Local::now().date_naive());
    let week = calendar.week_of(date)?;
    let (start, end) = calendar.week_range(week)?;
    println!(
        "{date} is {week} (Q{}, M{}): {start} .. {end}",
        week.quarter(),
        week.month()
    );
    Ok(())
}

fn show_status(store: &SledStore) -> Result<()> {
    for table in Table::ALL {
        println!("{:<32} {:>10}", table.name(), store.count(table)?);
    }
    println!("{:<32} {:>10}", "size on disk (bytes)", store.size_bytes());
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    let CliArgs {
        config: config_path,
        data_dir,
        log_json,
        command,
    } = CliArgs::parse();
    init_tracing(log_json);

    let calendar = IntelCalendar::new();

    match command {
        SubCommand::ValidateConfig { path } => validate_config(path.as_deref().or(config_path.as_deref())),
        SubCommand::Week { date } => show_week(date, &calendar),
        SubCommand::Weeks { drop_root } => {
            for week in WeeklyDrop::new(drop_root, &calendar).list_available_weeks()? {
                println!("{week}");
            }
            Ok(())
        }
        command => {
            let cfg = load_config(config_path.as_deref(), data_dir)?;
            let store = open_store(cfg)?;
            run_command(command, cfg, &store, &calendar)?;
            store.flush()?;
            Ok(())
        }
    }
}

fn run_command(
    command: SubCommand,
    cfg: &PmFlexConfig,
    store: &SledStore,
    calendar: &IntelCalendar,
) -> Result<()> {
    let stamp = RunStamp::now();
    let pipeline = Pipeline::new(store, cfg, calendar);

    match command {
        SubCommand::Load {
            csv,
            drop_root,
            week,
            weeks_back,
            population,
        } => {
            let path = resolve_export(csv, drop_root, week, weeks_back, calendar)?;
            let stats = pipeline.load(&path, population.as_deref())?;
            println!(
                "Loaded {} of {} records from {} ({} duplicates, {} errors)",
                stats.rows_loaded, stats.records_read, stats.source, stats.duplicates, stats.errors
            );
        }
        SubCommand::Enrich { start, end, full } => {
            let enricher = Enricher::new(store, cfg, calendar);
            if full {
                enricher.reset_outputs()?;
            }
            let filter = EventFilter {
                start: start.and_then(|d| d.and_hms_opt(0, 0, 0)),
                end: end.and_then(|d| d.and_hms_opt(0, 0, 0)),
                incremental: !full,
            };
            let stats = enricher.run(&filter, &stamp)?;
            println!(
                "{}: {} events enriched, {} summary rows, {} tools scored ({} chronic)",
                stats.status,
                stats.enriched_rows_loaded,
                stats.summary_rows_created,
                stats.chronic_tools_analyzed,
                stats.chronic_tools_flagged
            );
        }
        SubCommand::Kpi { start_ww, end_ww, full } => {
            let engine = KpiEngine::new(store);
            if full {
                engine.reset_outputs()?;
            }
            let range = WeekRange::new(start_ww, end_ww)?;
            let stats = engine.run(&range, !full, &stamp)?;
            println!(
                "{}: {} site rows, {} chamber rows, {} part rows, {} history rows",
                stats.status, stats.site_rows, stats.ceid_rows, stats.part_rows, stats.history_rows
            );
        }
        SubCommand::Run { csv, population, full } => {
            let options = PipelineOptions {
                csv,
                population_flags: population,
                full,
                ..PipelineOptions::default()
            };
            let report = pipeline.run(&options, &stamp)?;
            println!(
                "Run {} finished in {:.2}s: enrichment {}, KPI {}",
                report.run_id,
                report.elapsed.as_secs_f64(),
                report.enrichment.status,
                report.kpi.status
            );
        }
        SubCommand::Status => show_status(store)?,
        SubCommand::Reset { all } => {
            pipeline.reset_derived()?;
            if all {
                store.clear(Table::Raw)?;
                store.clear(Table::DimDate)?;
                warn!("Raw and DimDate tables cleared");
            }
        }
        // Need no store; dispatched in main
        SubCommand::ValidateConfig { .. } | SubCommand::Week { .. } | SubCommand::Weeks { .. } => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_reprocess_rejects_a_range() {
        assert!(CliArgs::try_parse_from(["pm-flex", "kpi", "--full", "--start-ww", "2025WW10"]).is_err());
        assert!(CliArgs::try_parse_from(["pm-flex", "kpi", "--full", "--end-ww", "2025WW12"]).is_err());
        assert!(CliArgs::try_parse_from(["pm-flex", "enrich", "--full", "--start", "2025-03-01"]).is_err());
        assert!(CliArgs::try_parse_from(["pm-flex", "enrich", "--full", "--end", "2025-03-20"]).is_err());
    }

    #[test]
    fn full_or_range_alone_parses() {
        let args = CliArgs::try_parse_from(["pm-flex", "kpi", "--full"]).unwrap();
        assert!(matches!(args.command, SubCommand::Kpi { full: true, start_ww: None, end_ww: None }));

        let args = CliArgs::try_parse_from(["pm-flex", "kpi", "--start-ww", "2025WW10", "--end-ww", "2025WW12"]).unwrap();
        let SubCommand::Kpi { start_ww, end_ww, full } = args.command else {
            panic!("expected the kpi subcommand");
        };
        assert!(!full);
        assert_eq!(start_ww, Some(FiscalWeek::new(2025, 10)));
        assert_eq!(end_ww, Some(FiscalWeek::new(2025, 12)));

        let args = CliArgs::try_parse_from(["pm-flex", "enrich", "--start", "2025-03-01"]).unwrap();
        assert!(matches!(args.command, SubCommand::Enrich { full: false, start: Some(_), end: None }));
    }
}
