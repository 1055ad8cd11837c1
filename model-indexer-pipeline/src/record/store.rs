//! Record store trait and an in-memory implementation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::{Record, RecordType};
use crate::errors::PipelineError;
use model_indexer_shared::DocumentId;

/// Abstracts the host application's data store (typically an ORM).
///
/// Used to serialize records by id, to compare a record against its stored
/// state before a save, and to walk a whole collection for a rebuild.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch one record by primary key.
    ///
    /// `fields` restricts the projection to what the descriptor needs; an
    /// empty slice means every field. Returns `Ok(None)` when no row matches.
    async fn fetch(
        &self,
        record_type: &RecordType,
        id: &DocumentId,
        fields: &[String],
    ) -> Result<Option<Arc<dyn Record>>, PipelineError>;

    /// Number of records in the collection.
    async fn count(&self, record_type: &RecordType) -> Result<usize, PipelineError>;

    /// One page of the collection in a stable order.
    async fn fetch_page(
        &self,
        record_type: &RecordType,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Arc<dyn Record>>, PipelineError>;
}

/// Record store keeping JSON rows in memory, ordered by id.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    rows: RwLock<HashMap<String, BTreeMap<DocumentId, Map<String, Value>>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a row.
    pub async fn insert(
        &self,
        record_type: &RecordType,
        id: impl Into<DocumentId>,
        row: Map<String, Value>,
    ) {
        self.rows
            .write()
            .await
            .entry(record_type.name().to_string())
            .or_default()
            .insert(id.into(), row);
    }

    /// Remove a row, returning it if present.
    pub async fn remove(
        &self,
        record_type: &RecordType,
        id: &DocumentId,
    ) -> Option<Map<String, Value>> {
        self.rows
            .write()
            .await
            .get_mut(record_type.name())
            .and_then(|rows| rows.remove(id))
    }
}

fn project(row: &Map<String, Value>, fields: &[String]) -> Map<String, Value> {
    if fields.is_empty() {
        return row.clone();
    }
    row.iter()
        .filter(|(key, _)| fields.iter().any(|f| f == *key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn fetch(
        &self,
        record_type: &RecordType,
        id: &DocumentId,
        fields: &[String],
    ) -> Result<Option<Arc<dyn Record>>, PipelineError> {
        let rows = self.rows.read().await;
        Ok(rows
            .get(record_type.name())
            .and_then(|rows| rows.get(id))
            .map(|row| Arc::new(project(row, fields)) as Arc<dyn Record>))
    }

    async fn count(&self, record_type: &RecordType) -> Result<usize, PipelineError> {
        let rows = self.rows.read().await;
        Ok(rows.get(record_type.name()).map(BTreeMap::len).unwrap_or(0))
    }

    async fn fetch_page(
        &self,
        record_type: &RecordType,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Arc<dyn Record>>, PipelineError> {
        let rows = self.rows.read().await;
        Ok(rows
            .get(record_type.name())
            .map(|rows| {
                rows.values()
                    .skip(offset)
                    .take(limit)
                    .map(|row| Arc::new(row.clone()) as Arc<dyn Record>)
                    .collect()
            })
            .unwrap_or_default())
    }
}
