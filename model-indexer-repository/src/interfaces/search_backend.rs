//! Search backend trait definition.
//!
//! This module defines the abstract interface the sync pipeline writes
//! through, allowing for different backend implementations (OpenSearch,
//! Elasticsearch, in-memory).

use async_trait::async_trait;

use crate::errors::SearchError;
use crate::types::{BulkSummary, IndexCreation};
use model_indexer_shared::{BulkOperation, DocumentId, IndexMapping};

/// Abstracts the underlying search backend.
///
/// Implementations are shared behind an `Arc` by the index registry and the
/// bulk sync engine, so they must be `Send + Sync`.
///
/// Transport failures are reported as `SearchError::ConnectionError` so that
/// callers can tell an unreachable backend apart from a rejected request.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Create an index with the given mapping and the analysis settings its
    /// fields declare.
    ///
    /// # Returns
    ///
    /// * `Ok(IndexCreation::Created)` - If the index was created
    /// * `Ok(IndexCreation::AlreadyExists)` - If it existed with a compatible mapping
    /// * `Err(SearchError::MappingConflict)` - If it existed with an incompatible mapping
    /// * `Err(SearchError::ConnectionError)` - If the backend is unreachable
    async fn create_index(
        &self,
        index: &str,
        mapping: &IndexMapping,
    ) -> Result<IndexCreation, SearchError>;

    /// Submit one bulk request.
    ///
    /// Any rejected document fails the whole call with
    /// `SearchError::BulkOperationError`. Deleting a document that does not
    /// exist is not a rejection.
    async fn bulk(
        &self,
        index: &str,
        document_type: &str,
        operations: &[BulkOperation],
    ) -> Result<BulkSummary, SearchError>;

    /// Delete a single document.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the document was deleted
    /// * `Err(SearchError::NotFound)` - If the document did not exist
    /// * `Err(SearchError)` - If the deletion fails
    async fn delete_document(
        &self,
        index: &str,
        document_type: &str,
        id: &DocumentId,
    ) -> Result<(), SearchError>;

    /// Make all operations performed on `index` visible to searches.
    async fn refresh(&self, index: &str) -> Result<(), SearchError>;

    /// Check if the backend is healthy and reachable.
    async fn health_check(&self) -> Result<bool, SearchError>;
}
