use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{StorageError, Table, TableStore};

/// In-memory table store for testing and dry runs
///
/// Thread-safe via `RwLock`. Not durable: data is lost on drop.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<HashMap<Table, Vec<Value>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Lock(e.to_string())
}

impl TableStore for InMemoryStore {
    fn append(&self, table: Table, rows: &[Value]) -> Result<usize, StorageError> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        tables.entry(table).or_default().extend_from_slice(rows);
        Ok(rows.len())
    }

    fn fetch(&self, table: Table) -> Result<Vec<Value>, StorageError> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables.get(&table).cloned().unwrap_or_default())
    }

    fn overwrite(&self, table: Table, rows: &[Value]) -> Result<usize, StorageError> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        tables.insert(table, rows.to_vec());
        Ok(rows.len())
    }

    fn clear(&self, table: Table) -> Result<(), StorageError> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        tables.remove(&table);
        Ok(())
    }

    fn count(&self, table: Table) -> Result<usize, StorageError> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables.get(&table).map_or(0, Vec::len))
    }

    fn backend_name(&self) -> &'static str {
        "InMemory"
    }
}
