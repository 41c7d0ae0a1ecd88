//! Raw event ingest
//!
//! - `csv`: quote-aware CSV parsing and row decoding for PM Flex exports
//! - `loader`: header validation, id de-duplication and append to the raw table
//! - `discovery`: weekly drop folders (`<root>/<YYYYWWnn>/PM_Flex.csv`)
//! - `population`: optional per-tool population flags from a side file
//! - `quality`: null-share profiling
//!
//! `fetch_raw_events` is the read side used by enrichment.

pub mod csv;
pub mod discovery;
pub mod loader;
pub mod population;
pub mod quality;

pub use discovery::WeeklyDrop;
pub use loader::{LoadStats, RawLoader};
pub use population::PopulationFlags;

use chrono::NaiveDateTime;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::info;

use crate::calendar::CalendarError;
use crate::storage::{StorageError, Table, TableStore, TableStoreExt};
use crate::types::PmEvent;

/// Field every event-derived row carries its source id under.
const ID_FIELD: &str = "pm_flex_raw_id";

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{} is empty", .0.display())]
    EmptyFile(PathBuf),

    #[error("{} is not a regular file", .0.display())]
    NotAFile(PathBuf),

    #[error("{source_name}: missing required columns: {}", .missing.join(", "))]
    Schema {
        source_name: String,
        missing: Vec<String>,
    },

    #[error("no PM Flex export under {} within {weeks_back} week(s) of {from}", .root.display())]
    NoExportFound {
        root: PathBuf,
        from: String,
        weeks_back: u32,
    },

    #[error(transparent)]
    Calendar(#[from] CalendarError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Which raw events to hand to enrichment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Inclusive lower bound on the transaction timestamp
    pub start: Option<NaiveDateTime>,
    /// Exclusive upper bound on the transaction timestamp
    pub end: Option<NaiveDateTime>,
    /// Skip events that already have an enriched row
    pub incremental: bool,
}

impl EventFilter {
    /// Every raw event not yet enriched.
    pub const fn incremental() -> Self {
        Self {
            start: None,
            end: None,
            incremental: true,
        }
    }

    /// Events without a transaction date only pass when no range is set.
    pub fn matches_date(&self, txn_date: Option<NaiveDateTime>) -> bool {
        if self.start.is_none() && self.end.is_none() {
            return true;
        }
        let Some(ts) = txn_date else {
            return false;
        };
        self.start.map_or(true, |s| ts >= s) && self.end.map_or(true, |e| ts < e)
    }
}

/// Ids already present in `table`. Every row must carry `pm_flex_raw_id`.
pub fn stored_ids(store: &dyn TableStore, table: Table) -> Result<HashSet<String>, StorageError> {
    store
        .fetch(table)?
        .iter()
        .map(|row| {
            row.get(ID_FIELD)
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| StorageError::Decode {
                    table,
                    message: format!("row without {ID_FIELD}"),
                })
        })
        .collect()
}

/// Read raw events matching `filter`, in load order.
pub fn fetch_raw_events(store: &dyn TableStore, filter: &EventFilter) -> Result<Vec<PmEvent>, IngestError> {
    let raw: Vec<PmEvent> = store.fetch_rows(Table::Raw)?;
    let total = raw.len();

    let enriched = if filter.incremental {
        stored_ids(store, Table::Enriched)?
    } else {
        HashSet::new()
    };

    let events: Vec<PmEvent> = raw
        .into_iter()
        .filter(|e| filter.matches_date(e.txn_date))
        .filter(|e| !enriched.contains(&e.pm_flex_raw_id))
        .collect();

    info!(
        total,
        selected = events.len(),
        already_enriched = enriched.len(),
        incremental = filter.incremental,
        "Fetched raw events"
    );
    Ok(events)
}
