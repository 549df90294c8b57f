use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use vizdb_core::Row;

mod catalog;
mod execute;
mod ingest;

pub use catalog::{DataSource, DataSourceCatalog};
pub use ingest::{ingest_csv, CsvTable, IngestError};

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("collection '{0}' does not exist")]
    UnknownCollection(String),
    #[error("collection '{0}' already exists")]
    CollectionExists(String),
}

/// An immutable-after-ingest batch of rows under a name. Reads clone
/// rows out so the collection lock is never held across execution.
#[derive(Debug)]
pub struct Collection {
    pub name: String,
    rows: RwLock<Vec<Row>>,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: RwLock::new(Vec::new()),
        }
    }

    pub fn from_rows(name: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            rows: RwLock::new(rows),
        }
    }

    pub fn append(&self, mut rows: Vec<Row>) {
        self.rows.write().append(&mut rows);
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Page of rows in insertion order.
    pub fn scan(&self, skip: usize, limit: usize) -> Vec<Row> {
        self.rows.read().iter().skip(skip).take(limit).cloned().collect()
    }

    pub fn snapshot(&self) -> Vec<Row> {
        self.rows.read().clone()
    }
}

/// Named collections behind one lock. Pipeline execution takes the read
/// side; ingestion and drops take the write side.
pub struct Engine {
    pub collections: RwLock<HashMap<String, Arc<Collection>>>,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert_collection(&self, collection: Collection) -> Result<(), StorageError> {
        let mut map = self.collections.write();
        if map.contains_key(&collection.name) {
            return Err(StorageError::CollectionExists(collection.name.clone()));
        }
        log::info!(
            target: "vizdb::storage",
            "collection_created name={} rows={}",
            collection.name,
            collection.len()
        );
        map.insert(collection.name.clone(), Arc::new(collection));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<Collection>, StorageError> {
        self.collections
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::UnknownCollection(name.to_string()))
    }

    pub fn drop_collection(&self, name: &str) -> Result<(), StorageError> {
        let removed = self.collections.write().remove(name);
        match removed {
            Some(_) => {
                log::info!(target: "vizdb::storage", "collection_dropped name={}", name);
                Ok(())
            }
            None => Err(StorageError::UnknownCollection(name.to_string())),
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
