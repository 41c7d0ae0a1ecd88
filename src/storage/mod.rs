//! Table storage: pluggable backend for every PM Flex table
//!
//! Abstracts row persistence so the pipeline never touches a concrete
//! database:
//! - `SledStore`: embedded sled database, one tree per table
//! - `InMemoryStore`: `RwLock`-backed store for tests and dry runs
//!
//! Rows cross the trait boundary as `serde_json::Value` so the trait stays
//! object-safe; `TableStoreExt` adds typed helpers on top.

mod memory;
mod sled_store;

pub use memory::InMemoryStore;
pub use sled_store::SledStore;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// Tables
// ============================================================================

/// Every table the pipeline reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    /// Bronze: raw events as loaded
    Raw,
    /// Silver: one classified event per raw event
    Enriched,
    DowntimeSummary,
    ChronicTools,
    DimDate,
    /// Gold
    SiteKpis,
    CeidKpis,
    PartReplacement,
    ChronicHistory,
}

impl Table {
    pub const ALL: [Self; 9] = [
        Self::Raw,
        Self::Enriched,
        Self::DowntimeSummary,
        Self::ChronicTools,
        Self::DimDate,
        Self::SiteKpis,
        Self::CeidKpis,
        Self::PartReplacement,
        Self::ChronicHistory,
    ];

    /// Tables derived from the raw table, cleared by a full reprocess.
    pub const DERIVED: [Self; 7] = [
        Self::Enriched,
        Self::DowntimeSummary,
        Self::ChronicTools,
        Self::SiteKpis,
        Self::CeidKpis,
        Self::PartReplacement,
        Self::ChronicHistory,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Raw => "pm_flex_raw",
            Self::Enriched => "pm_flex_enriched",
            Self::DowntimeSummary => "pm_flex_downtime_summary",
            Self::ChronicTools => "pm_flex_chronic_tools",
            Self::DimDate => "DimDate",
            Self::SiteKpis => "fact_pm_kpis_by_site_ww",
            Self::CeidKpis => "fact_pm_kpis_by_ceid_ww",
            Self::PartReplacement => "fact_part_replacement_summary",
            Self::ChronicHistory => "fact_chronic_tools_history",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row no longer matches the expected schema.
    #[error("undecodable row in {table}: {message}")]
    Decode { table: Table, message: String },

    #[error("storage lock poisoned: {0}")]
    Lock(String),
}

// ============================================================================
// Store Trait
// ============================================================================

/// Trait for pluggable table backends.
///
/// Rows are returned in insertion order. Implementations must be thread-safe
/// (Send + Sync) even though the pipeline itself is single-threaded.
pub trait TableStore: Send + Sync {
    /// Append rows to a table. Returns the number written.
    fn append(&self, table: Table, rows: &[Value]) -> Result<usize, StorageError>;

    /// All rows of a table, in insertion order.
    fn fetch(&self, table: Table) -> Result<Vec<Value>, StorageError>;

    /// Atomically replace the full contents of a table.
    fn overwrite(&self, table: Table, rows: &[Value]) -> Result<usize, StorageError>;

    /// Remove every row of a table.
    fn clear(&self, table: Table) -> Result<(), StorageError>;

    fn count(&self, table: Table) -> Result<usize, StorageError>;

    /// Persist buffered writes, if the backend buffers.
    fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Typed row helpers for any `TableStore`.
pub trait TableStoreExt: TableStore {
    fn append_rows<T: Serialize>(&self, table: Table, rows: &[T]) -> Result<usize, StorageError> {
        let values = rows
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        let written = self.append(table, &values)?;
        tracing::debug!(table = %table, rows = written, backend = self.backend_name(), "Appended rows");
        Ok(written)
    }

    /// Decode every row of a table. A row that fails to decode is a schema
    /// error for the whole table.
    fn fetch_rows<T: DeserializeOwned>(&self, table: Table) -> Result<Vec<T>, StorageError> {
        self.fetch(table)?
            .into_iter()
            .map(|v| {
                serde_json::from_value(v).map_err(|e| StorageError::Decode {
                    table,
                    message: e.to_string(),
                })
            })
            .collect()
    }

    fn overwrite_rows<T: Serialize>(&self, table: Table, rows: &[T]) -> Result<usize, StorageError> {
        let values = rows
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        let written = self.overwrite(table, &values)?;
        tracing::debug!(table = %table, rows = written, backend = self.backend_name(), "Overwrote table");
        Ok(written)
    }
}

impl<S: TableStore + ?Sized> TableStoreExt for S {}
