//! Sled-backed table store.
//!
//! One named tree per table. Keys are ids from `Db::generate_id` as u64
//! big-endian bytes, so tree iteration order is insertion order. Values are
//! JSON-serialized rows.

use serde_json::Value;
use sled::{Batch, Db, Tree};
use std::path::Path;
use tracing::info;

use super::{StorageError, Table, TableStore};

pub struct SledStore {
    db: Db,
}

impl SledStore {
    /// Open or create the store at the specified directory
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path_ref = path.as_ref();
        let db = sled::open(path_ref)?;
        info!("Table store opened at {:?}", path_ref);
        Ok(Self { db })
    }

    /// Open a throwaway database that is removed on drop (for testing)
    pub fn open_temp() -> Result<Self, StorageError> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Ok(Self { db })
    }

    fn tree(&self, table: Table) -> Result<Tree, StorageError> {
        Ok(self.db.open_tree(table.name())?)
    }

    fn insert_batch(&self, batch: &mut Batch, rows: &[Value]) -> Result<(), StorageError> {
        for row in rows {
            let key = self.db.generate_id()?.to_be_bytes();
            batch.insert(key.to_vec(), serde_json::to_vec(row)?);
        }
        Ok(())
    }

    /// Get database size in bytes
    pub fn size_bytes(&self) -> u64 {
        self.db.size_on_disk().unwrap_or(0)
    }
}

impl TableStore for SledStore {
    fn append(&self, table: Table, rows: &[Value]) -> Result<usize, StorageError> {
        let tree = self.tree(table)?;
        let mut batch = Batch::default();
        self.insert_batch(&mut batch, rows)?;
        tree.apply_batch(batch)?;
        Ok(rows.len())
    }

    fn fetch(&self, table: Table) -> Result<Vec<Value>, StorageError> {
        let tree = self.tree(table)?;
        tree.iter()
            .map(|item| {
                let (_, value) = item?;
                Ok(serde_json::from_slice(&value)?)
            })
            .collect()
    }

    fn overwrite(&self, table: Table, rows: &[Value]) -> Result<usize, StorageError> {
        let tree = self.tree(table)?;
        let mut batch = Batch::default();
        for item in tree.iter().keys() {
            batch.remove(item?);
        }
        self.insert_batch(&mut batch, rows)?;
        tree.apply_batch(batch)?;
        Ok(rows.len())
    }

    fn clear(&self, table: Table) -> Result<(), StorageError> {
        self.tree(table)?.clear()?;
        Ok(())
    }

    fn count(&self, table: Table) -> Result<usize, StorageError> {
        Ok(self.tree(table)?.len())
    }

    fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "Sled"
    }
}
