//! PM Flex: preventive-maintenance fleet health
//!
//! Batch engine that enriches PM event exports, scores chronic tools and
//! rolls the results up into weekly KPI tables.
//!
//! ## Architecture
//!
//! - **Ingest**: CSV exports → raw events (bronze)
//! - **Classification**: PM timing, scheduled status, chronic scoring
//! - **Aggregation**: per-tool and per-week folds over classified events
//! - **Enrichment**: raw → classified events, downtime summary, chronic tools (silver)
//! - **KPI**: site and chamber weekly facts, rolling stats, history (gold)
//! - **Storage**: `TableStore` trait over sled or memory

pub mod aggregation;
pub mod calendar;
pub mod classification;
pub mod config;
pub mod enrichment;
pub mod ingest;
pub mod kpi;
pub mod pipeline;
pub mod storage;
pub mod types;

pub use calendar::{FiscalCalendar, FiscalWeek, IntelCalendar};
pub use config::PmFlexConfig;
pub use enrichment::{Enricher, EnrichmentStats};
pub use ingest::{fetch_raw_events, EventFilter, RawLoader};
pub use kpi::{KpiEngine, KpiStats, WeekRange};
pub use pipeline::{Pipeline, PipelineError, PipelineOptions, PipelineReport};
pub use storage::{InMemoryStore, SledStore, StorageError, Table, TableStore, TableStoreExt};
pub use types::{ClassifiedEvent, PmEvent, RunStamp, RunStatus};
