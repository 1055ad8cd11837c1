//! In-memory search backend.
//!
//! Keeps indices, mappings and documents in process memory and records every
//! request it receives. Intended for host application tests and local runs
//! without a cluster. Failures can be injected to exercise error paths.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::SearchError;
use crate::interfaces::SearchBackend;
use crate::opensearch::{mapping_conflicts, mapping_properties};
use crate::types::{BulkSummary, IndexCreation};
use model_indexer_shared::{BulkOperation, Document, DocumentId, IndexMapping};

/// A bulk request as received by the in-memory backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedBulk {
    pub index: String,
    pub document_type: String,
    pub operations: Vec<BulkOperation>,
}

#[derive(Debug, Default)]
struct MemoryIndex {
    mapping: Option<IndexMapping>,
    documents: BTreeMap<String, Document>,
}

#[derive(Debug, Default)]
struct MemoryState {
    indices: HashMap<String, MemoryIndex>,
    bulk_requests: Vec<RecordedBulk>,
    create_requests: Vec<String>,
    single_deletes: Vec<(String, DocumentId)>,
    refreshes: Vec<String>,
    rejected_ids: HashSet<String>,
    offline: bool,
    next_auto_id: u64,
}

/// Search backend holding everything in memory.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<MemoryState>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a connection error, or recover.
    pub async fn set_offline(&self, offline: bool) {
        self.state.lock().await.offline = offline;
    }

    /// Reject index operations for `id` in bulk requests.
    pub async fn reject_document(&self, id: impl Into<String>) {
        self.state.lock().await.rejected_ids.insert(id.into());
    }

    /// Seed an existing index, as if created by an earlier deployment.
    pub async fn seed_index(&self, index: &str, mapping: IndexMapping) {
        self.state.lock().await.indices.insert(
            index.to_string(),
            MemoryIndex {
                mapping: Some(mapping),
                documents: BTreeMap::new(),
            },
        );
    }

    /// Current content of a document.
    pub async fn document(&self, index: &str, id: &str) -> Option<Document> {
        let state = self.state.lock().await;
        state.indices.get(index)?.documents.get(id).cloned()
    }

    /// Number of documents held by an index.
    pub async fn document_count(&self, index: &str) -> usize {
        let state = self.state.lock().await;
        state
            .indices
            .get(index)
            .map(|i| i.documents.len())
            .unwrap_or(0)
    }

    /// Whether an index exists.
    pub async fn has_index(&self, index: &str) -> bool {
        self.state.lock().await.indices.contains_key(index)
    }

    /// Mapping an index was created with.
    pub async fn mapping(&self, index: &str) -> Option<IndexMapping> {
        let state = self.state.lock().await;
        state.indices.get(index)?.mapping.clone()
    }

    /// Every bulk request received, in order.
    pub async fn bulk_requests(&self) -> Vec<RecordedBulk> {
        self.state.lock().await.bulk_requests.clone()
    }

    /// Every index name a creation was requested for, in order.
    pub async fn create_requests(&self) -> Vec<String> {
        self.state.lock().await.create_requests.clone()
    }

    /// Every single-document delete received, in order.
    pub async fn single_deletes(&self) -> Vec<(String, DocumentId)> {
        self.state.lock().await.single_deletes.clone()
    }

    /// Every refreshed index name, in order.
    pub async fn refreshes(&self) -> Vec<String> {
        self.state.lock().await.refreshes.clone()
    }
}

fn offline_error() -> SearchError {
    SearchError::connection("in-memory backend is offline")
}

#[async_trait]
impl SearchBackend for InMemoryBackend {
    async fn create_index(
        &self,
        index: &str,
        mapping: &IndexMapping,
    ) -> Result<IndexCreation, SearchError> {
        let mut state = self.state.lock().await;
        if state.offline {
            return Err(offline_error());
        }
        state.create_requests.push(index.to_string());

        if !state.indices.contains_key(index) {
            state.indices.insert(
                index.to_string(),
                MemoryIndex {
                    mapping: Some(mapping.clone()),
                    documents: BTreeMap::new(),
                },
            );
            return Ok(IndexCreation::Created);
        }

        let existing = state.indices.entry(index.to_string()).or_default();
        match existing.mapping.clone() {
            None => {
                // Auto-created by a write; adopt the requested mapping.
                existing.mapping = Some(mapping.clone());
                Ok(IndexCreation::AlreadyExists)
            }
            Some(current) => {
                let conflicts =
                    mapping_conflicts(&mapping_properties(&current.fields), &mapping.fields);
                if conflicts.is_empty() {
                    Ok(IndexCreation::AlreadyExists)
                } else {
                    Err(SearchError::mapping_conflict(index, conflicts.join("; ")))
                }
            }
        }
    }

    async fn bulk(
        &self,
        index: &str,
        document_type: &str,
        operations: &[BulkOperation],
    ) -> Result<BulkSummary, SearchError> {
        let mut state = self.state.lock().await;
        if state.offline {
            return Err(offline_error());
        }

        state.bulk_requests.push(RecordedBulk {
            index: index.to_string(),
            document_type: document_type.to_string(),
            operations: operations.to_vec(),
        });

        let rejected = state.rejected_ids.clone();
        let mut next_auto_id = state.next_auto_id;
        let target = state.indices.entry(index.to_string()).or_default();

        let mut summary = BulkSummary {
            total: operations.len(),
            ..BulkSummary::default()
        };
        let mut failures = Vec::new();

        for operation in operations {
            match operation {
                BulkOperation::Index { id, document } => {
                    let key = match id {
                        Some(id) => id.as_str().to_string(),
                        None => {
                            next_auto_id += 1;
                            format!("auto-{}", next_auto_id)
                        }
                    };
                    if rejected.contains(&key) {
                        failures.push(format!("{}: rejected by in-memory backend", key));
                        continue;
                    }
                    target.documents.insert(key, document.clone());
                    summary.indexed += 1;
                }
                BulkOperation::Delete { id } => {
                    target.documents.remove(id.as_str());
                    summary.deleted += 1;
                }
            }
        }
        state.next_auto_id = next_auto_id;

        if failures.is_empty() {
            debug!(index = %index, count = operations.len(), "In-memory bulk applied");
            Ok(summary)
        } else {
            Err(SearchError::bulk_operation(index, failures))
        }
    }

    async fn delete_document(
        &self,
        index: &str,
        document_type: &str,
        id: &DocumentId,
    ) -> Result<(), SearchError> {
        let mut state = self.state.lock().await;
        if state.offline {
            return Err(offline_error());
        }
        state.single_deletes.push((index.to_string(), id.clone()));

        let removed = state
            .indices
            .get_mut(index)
            .and_then(|i| i.documents.remove(id.as_str()));

        match removed {
            Some(_) => Ok(()),
            None => Err(SearchError::not_found(format!(
                "{}/{}/{}",
                index, document_type, id
            ))),
        }
    }

    async fn refresh(&self, index: &str) -> Result<(), SearchError> {
        let mut state = self.state.lock().await;
        if state.offline {
            return Err(offline_error());
        }
        state.refreshes.push(index.to_string());
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, SearchError> {
        let state = self.state.lock().await;
        if state.offline {
            return Err(offline_error());
        }
        Ok(true)
    }
}
