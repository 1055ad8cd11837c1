//! OpenSearch backend implementation.
//!
//! This module provides the concrete implementation of `SearchBackend`
//! using the OpenSearch Rust client.

use async_trait::async_trait;
use opensearch::{
    cluster::ClusterHealthParts,
    http::request::JsonBody,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesGetMappingParts, IndicesRefreshParts},
    BulkParts, DeleteParts, OpenSearch,
};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::config::BackendConfig;
use crate::errors::SearchError;
use crate::interfaces::SearchBackend;
use crate::opensearch::index_config::{build_index_body, mapping_conflicts};
use crate::types::{BulkSummary, IndexCreation};
use model_indexer_shared::{BulkOperation, DocumentId, IndexMapping, OperationKind};

/// Error type reported when creating an index that already exists.
const ALREADY_EXISTS: &str = "resource_already_exists_exception";

/// OpenSearch backend.
///
/// OpenSearch has no mapping types, so the document type is recorded in the
/// index mapping's `_meta` and otherwise only appears in logs.
///
/// # Example
///
/// ```ignore
/// let backend = OpenSearchBackend::new(&BackendConfig::with_url("http://localhost:9200"))?;
/// backend.create_index("books", &mapping).await?;
/// backend.bulk("books", "book", &operations).await?;
/// backend.refresh("books").await?;
/// ```
pub struct OpenSearchBackend {
    client: OpenSearch,
}

impl OpenSearchBackend {
    /// Create a new backend connected to the configured URL.
    ///
    /// No request is sent; an unreachable cluster surfaces on first use.
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchBackend)` - A new backend instance
    /// * `Err(SearchError)` - If the URL is invalid or the transport cannot be built
    pub fn new(config: &BackendConfig) -> Result<Self, SearchError> {
        let parsed_url =
            Url::parse(&config.url).map_err(|e| SearchError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let mut builder = TransportBuilder::new(conn_pool);
        if config.disable_proxy {
            builder = builder.disable_proxy();
        }
        let transport = builder
            .build()
            .map_err(|e| SearchError::connection(e.to_string()))?;

        info!(url = %config.url, "Created OpenSearch backend");

        Ok(Self {
            client: OpenSearch::new(transport),
        })
    }

    /// Build the newline-delimited bulk body: one action line per operation,
    /// followed by the document for index operations.
    fn bulk_body(operations: &[BulkOperation]) -> Vec<Value> {
        let mut body = Vec::with_capacity(operations.len() * 2);
        for operation in operations {
            match operation {
                BulkOperation::Index { id: Some(id), document } => {
                    body.push(json!({ "index": { "_id": id.as_str() } }));
                    body.push(Value::Object(document.clone()));
                }
                BulkOperation::Index { id: None, document } => {
                    body.push(json!({ "index": {} }));
                    body.push(Value::Object(document.clone()));
                }
                BulkOperation::Delete { id } => {
                    body.push(json!({ "delete": { "_id": id.as_str() } }));
                }
            }
        }
        body
    }

    /// Collect a description of every rejected item in a bulk response.
    ///
    /// Deletes of absent documents come back as `not_found` results without an
    /// `error` object and are not rejections.
    fn bulk_failures(response: &Value) -> Vec<String> {
        if !response["errors"].as_bool().unwrap_or(false) {
            return Vec::new();
        }

        response["items"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_object()?.values().next())
                    .filter_map(|result| {
                        let error = result.get("error")?;
                        let id = result["_id"].as_str().unwrap_or("<auto>");
                        let kind = error["type"].as_str().unwrap_or("unknown");
                        let reason = error["reason"].as_str().unwrap_or("");
                        Some(format!("{}: {} {}", id, kind, reason).trim_end().to_string())
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn summarize(operations: &[BulkOperation]) -> BulkSummary {
        let indexed = operations
            .iter()
            .filter(|op| op.kind() == OperationKind::Index)
            .count();
        BulkSummary {
            total: operations.len(),
            indexed,
            deleted: operations.len() - indexed,
        }
    }

    fn error_type(body: &Value) -> Option<&str> {
        body["error"]["type"].as_str()
    }

    /// Compare the mapping of an existing index with the desired one.
    async fn check_existing_mapping(
        &self,
        index: &str,
        mapping: &IndexMapping,
    ) -> Result<IndexCreation, SearchError> {
        let response = self
            .client
            .indices()
            .get_mapping(IndicesGetMappingParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| SearchError::connection(e.to_string()))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchError::parse(e.to_string()))?;

        // Keyed by the concrete index name, which differs from `index` for aliases.
        let existing = body
            .as_object()
            .and_then(|indices| indices.values().next())
            .map(|entry| entry["mappings"]["properties"].clone())
            .unwrap_or_else(|| json!({}));

        let conflicts = mapping_conflicts(&existing, &mapping.fields);
        if conflicts.is_empty() {
            debug!(index = %index, "Index already exists with a compatible mapping");
            Ok(IndexCreation::AlreadyExists)
        } else {
            error!(index = %index, conflicts = ?conflicts, "Existing index mapping conflicts");
            Err(SearchError::mapping_conflict(index, conflicts.join("; ")))
        }
    }
}

#[async_trait]
impl SearchBackend for OpenSearchBackend {
    #[instrument(skip(self, mapping), fields(document_type = %mapping.document_type))]
    async fn create_index(
        &self,
        index: &str,
        mapping: &IndexMapping,
    ) -> Result<IndexCreation, SearchError> {
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index))
            .body(build_index_body(mapping))
            .send()
            .await
            .map_err(|e| SearchError::connection(e.to_string()))?;

        let status = response.status_code();
        if status.is_success() {
            info!(index = %index, "Created index");
            return Ok(IndexCreation::Created);
        }

        let body: Value = response.json().await.unwrap_or_default();
        if status.as_u16() == 400 && Self::error_type(&body) == Some(ALREADY_EXISTS) {
            return self.check_existing_mapping(index, mapping).await;
        }

        error!(status = %status, body = %body, "Index creation failed");
        Err(SearchError::index_creation(format!(
            "Creating index {} failed with status {}: {}",
            index, status, body
        )))
    }

    #[instrument(skip(self, operations), fields(count = operations.len()))]
    async fn bulk(
        &self,
        index: &str,
        document_type: &str,
        operations: &[BulkOperation],
    ) -> Result<BulkSummary, SearchError> {
        if operations.is_empty() {
            return Ok(BulkSummary::default());
        }

        let body: Vec<JsonBody<Value>> = Self::bulk_body(operations)
            .into_iter()
            .map(JsonBody::from)
            .collect();

        let response = self
            .client
            .bulk(BulkParts::Index(index))
            .body(body)
            .send()
            .await
            .map_err(|e| SearchError::connection(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Bulk request failed");
            return Err(SearchError::bulk_operation(
                index,
                vec![format!("status {}: {}", status, error_body)],
            ));
        }

        let response_body: Value = response
            .json()
            .await
            .map_err(|e| SearchError::parse(e.to_string()))?;

        let failures = Self::bulk_failures(&response_body);
        if !failures.is_empty() {
            error!(
                index = %index,
                document_type = %document_type,
                failed = failures.len(),
                "Bulk request rejected documents"
            );
            return Err(SearchError::bulk_operation(index, failures));
        }

        debug!(index = %index, document_type = %document_type, "Bulk request applied");
        Ok(Self::summarize(operations))
    }

    async fn delete_document(
        &self,
        index: &str,
        document_type: &str,
        id: &DocumentId,
    ) -> Result<(), SearchError> {
        let response = self
            .client
            .delete(DeleteParts::IndexId(index, id.as_str()))
            .send()
            .await
            .map_err(|e| SearchError::connection(e.to_string()))?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Err(SearchError::not_found(format!(
                "{}/{}/{}",
                index, document_type, id
            )));
        }

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Delete request failed");
            return Err(SearchError::delete(format!(
                "Delete failed with status {}: {}",
                status, error_body
            )));
        }

        debug!(index = %index, doc_id = %id, "Document deleted");
        Ok(())
    }

    async fn refresh(&self, index: &str) -> Result<(), SearchError> {
        let response = self
            .client
            .indices()
            .refresh(IndicesRefreshParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| SearchError::connection(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(SearchError::refresh(format!(
                "Refreshing {} failed with status {}: {}",
                index, status, error_body
            )));
        }

        Ok(())
    }

    async fn health_check(&self) -> Result<bool, SearchError> {
        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await
            .map_err(|e| SearchError::connection(e.to_string()))?;

        if !response.status_code().is_success() {
            return Ok(false);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchError::parse(e.to_string()))?;

        let status = body["status"].as_str().unwrap_or("red");
        if status == "red" {
            warn!(status = %status, "Cluster health is red");
        }
        Ok(status != "red")
    }
}
