//! Dependency initialization and wiring for the model indexer.

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::IndexerSettings;
use crate::IndexerError;
use model_indexer_pipeline::{ModelIndexer, RecordStore, TemplateRenderer};
use model_indexer_repository::{OpenSearchBackend, SearchBackend};

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The settings the indexer was built from.
    pub settings: IndexerSettings,
    /// The search backend shared by the indexer's components.
    pub backend: Arc<dyn SearchBackend>,
    /// The configured indexer, ready for record type registration.
    pub indexer: ModelIndexer,
}

impl Dependencies {
    /// Build the indexer on an OpenSearch backend.
    ///
    /// The record store and template renderer come from the host
    /// application. An unreachable or unhealthy cluster is logged but does
    /// not fail startup; registrations then defer index creation.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexerError)` - If the backend client cannot be created
    pub async fn new(
        settings: IndexerSettings,
        store: Arc<dyn RecordStore>,
        templates: Arc<dyn TemplateRenderer>,
    ) -> Result<Self, IndexerError> {
        info!(
            opensearch_url = %settings.opensearch_url,
            buffer_size = settings.buffer_size,
            signal_processor = %settings.signal_processor,
            "Initializing dependencies"
        );

        let backend = OpenSearchBackend::new(&settings.backend_config()).map_err(|e| {
            IndexerError::config(format!("Failed to create OpenSearch backend: {}", e))
        })?;

        Self::with_backend(settings, Arc::new(backend), store, templates).await
    }

    /// Build the indexer on an already constructed backend.
    pub async fn with_backend(
        settings: IndexerSettings,
        backend: Arc<dyn SearchBackend>,
        store: Arc<dyn RecordStore>,
        templates: Arc<dyn TemplateRenderer>,
    ) -> Result<Self, IndexerError> {
        match backend.health_check().await {
            Ok(true) => info!("Search backend connection verified"),
            Ok(false) => warn!("Search backend reports an unhealthy cluster"),
            Err(e) => warn!(error = %e, "Search backend is unreachable, continuing"),
        }

        let indexer = ModelIndexer::new(
            Arc::clone(&backend),
            store,
            templates,
            settings.indexer_config(),
        );

        Ok(Self {
            settings,
            backend,
            indexer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_indexer_pipeline::{
        FieldSpec, IndexDescriptor, InMemoryRecordStore, PipelineError, Record, RecordType,
        SyncItems, SyncOptions, TemplateRegistry,
    };
    use model_indexer_repository::InMemoryBackend;
    use model_indexer_shared::{OperationKind, SearchFieldType};
    use serde_json::{json, Value};

    fn record(value: Value) -> Arc<dyn Record> {
        Arc::new(value.as_object().cloned().unwrap())
    }

    fn articles() -> RecordType {
        RecordType::new("Article")
    }

    async fn dependencies(buffer_size: usize) -> (Arc<InMemoryBackend>, Dependencies) {
        let backend = Arc::new(InMemoryBackend::new());
        let settings = IndexerSettings {
            buffer_size,
            ..IndexerSettings::default()
        };
        let templates = TemplateRegistry::new().with_template("headline", "{{ object.title }}");
        let mut deps = Dependencies::with_backend(
            settings,
            backend.clone(),
            Arc::new(InMemoryRecordStore::new()),
            Arc::new(templates),
        )
        .await
        .unwrap();

        let builder = IndexDescriptor::builder()
            .index("news")
            .field(FieldSpec::attribute("title", SearchFieldType::Text))
            .field(FieldSpec::new("headline", SearchFieldType::Keyword).template("headline"))
            .matches(|record| record.attribute("published") == Some(json!(true)));
        deps.indexer.register(&articles(), builder).await.unwrap();

        (backend, deps)
    }

    #[tokio::test]
    async fn test_two_creates_fill_buffer_of_two() {
        let (backend, mut deps) = dependencies(2).await;

        deps.indexer
            .on_post_save(&articles(), record(json!({"pk": 1, "title": "A", "published": true})), true)
            .await
            .unwrap();
        assert_eq!(deps.indexer.pending(&articles()), 1);
        deps.indexer
            .on_post_save(&articles(), record(json!({"pk": 2, "title": "B", "published": true})), true)
            .await
            .unwrap();

        assert_eq!(deps.indexer.pending(&articles()), 0);
        let requests = backend.bulk_requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].document_type, "article");
        assert_eq!(requests[0].operations.len(), 2);
        let document = backend.document("news", "2").await.unwrap();
        assert_eq!(document["headline"], json!("B"));
    }

    #[tokio::test]
    async fn test_unpublished_article_never_reaches_index() {
        let (backend, mut deps) = dependencies(1).await;

        deps.indexer
            .on_post_save(&articles(), record(json!({"pk": 1, "title": "Draft", "published": false})), true)
            .await
            .unwrap();
        deps.indexer
            .sync(
                &articles(),
                SyncItems::Records(vec![record(json!({"pk": 2, "title": "Draft 2"}))]),
                OperationKind::Index,
                &SyncOptions::default(),
            )
            .await
            .unwrap();

        assert!(backend.bulk_requests().await.is_empty());
        assert_eq!(backend.document_count("news").await, 0);
    }

    #[tokio::test]
    async fn test_delete_three_ids_in_windows_of_two() {
        let (backend, mut deps) = dependencies(10).await;

        let report = deps
            .indexer
            .sync(
                &articles(),
                SyncItems::ids([7i64, 8, 9]),
                OperationKind::Delete,
                &SyncOptions::default().with_bulk_size(2),
            )
            .await
            .unwrap();

        assert_eq!(report.windows, 2);
        let sizes: Vec<_> = backend
            .bulk_requests()
            .await
            .iter()
            .map(|r| r.operations.len())
            .collect();
        assert_eq!(sizes, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_reindexing_same_id_keeps_latest() {
        let (backend, mut deps) = dependencies(1).await;

        for title in ["Old", "New"] {
            deps.indexer
                .on_post_save(&articles(), record(json!({"pk": 3, "title": title, "published": true})), false)
                .await
                .unwrap();
        }

        assert_eq!(backend.document_count("news").await, 1);
        assert_eq!(
            backend.document("news", "3").await.unwrap()["title"],
            json!("New")
        );
    }

    #[tokio::test]
    async fn test_second_registration_is_rejected() {
        let (_, mut deps) = dependencies(10).await;

        let result = deps
            .indexer
            .register(
                &articles(),
                IndexDescriptor::builder()
                    .index("other")
                    .field(FieldSpec::attribute("body", SearchFieldType::Text)),
            )
            .await;

        assert!(matches!(result, Err(PipelineError::AlreadyRegistered(_))));
        let descriptor = deps.indexer.registry().get_index_instance(&articles()).unwrap();
        assert_eq!(descriptor.index_name(), "news");
    }

    #[tokio::test]
    async fn test_unreachable_backend_does_not_fail_startup() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.set_offline(true).await;

        let mut deps = Dependencies::with_backend(
            IndexerSettings::default(),
            backend.clone(),
            Arc::new(InMemoryRecordStore::new()),
            Arc::new(TemplateRegistry::new()),
        )
        .await
        .unwrap();
        deps.indexer
            .register(
                &articles(),
                IndexDescriptor::builder().field(FieldSpec::attribute("title", SearchFieldType::Text)),
            )
            .await
            .unwrap();

        assert!(deps.indexer.registry().is_registered(&articles()));
        assert!(!backend.has_index("model_index-article").await);
    }
}
