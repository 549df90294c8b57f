use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use vizdb_core::{Id, Principal};

/// Catalog record tying an uploaded data set to its backing collection.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    pub id: Id,
    pub name: String,
    pub collection_name: String,
    pub columns: Vec<String>,
    pub row_count: usize,
    pub uploaded_by: Id,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct DataSourceCatalog {
    sources: RwLock<HashMap<Id, DataSource>>,
}

impl DataSourceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, source: DataSource) {
        self.sources.write().insert(source.id, source);
    }

    pub fn get(&self, id: &Id) -> Option<DataSource> {
        self.sources.read().get(id).cloned()
    }

    pub fn remove(&self, id: &Id) -> Option<DataSource> {
        self.sources.write().remove(id)
    }

    /// Sources the caller may see, newest first. Elevated callers see
    /// everything, everyone else their own uploads.
    pub fn list_visible(&self, principal: &Principal) -> Vec<DataSource> {
        let mut sources: Vec<DataSource> = self
            .sources
            .read()
            .values()
            .filter(|source| principal.can_access(source.uploaded_by))
            .cloned()
            .collect();
        sources.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sources
    }
}
