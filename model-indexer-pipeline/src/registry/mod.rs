//! Index registry.
//!
//! Maps each registered record type to its descriptor, creates indices on the
//! search backend and follows index rotation for dynamic naming policies.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::descriptor::{IndexDescriptor, IndexDescriptorBuilder};
use crate::errors::PipelineError;
use crate::record::RecordType;
use model_indexer_repository::{IndexCreation, SearchBackend};
use model_indexer_shared::IndexMapping;

/// Registered descriptors, one per record type.
pub struct IndexRegistry {
    backend: Arc<dyn SearchBackend>,
    descriptors: HashMap<String, IndexDescriptor>,
    /// Index names known to exist on the backend.
    created: HashSet<String>,
}

impl IndexRegistry {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            backend,
            descriptors: HashMap::new(),
            created: HashSet::new(),
        }
    }

    /// Register a record type and create its index.
    ///
    /// `explicit_index_name` overrides the builder's naming policy. Returns
    /// `Ok(None)` for swapped record types, which are skipped.
    ///
    /// An unreachable backend does not prevent registration; the index is
    /// created on the next sync instead. A mapping conflict with an existing
    /// index fails the registration.
    #[instrument(skip(self, record_type, builder), fields(record_type = %record_type))]
    pub async fn register(
        &mut self,
        record_type: &RecordType,
        builder: IndexDescriptorBuilder,
        explicit_index_name: Option<&str>,
    ) -> Result<Option<&IndexDescriptor>, PipelineError> {
        if record_type.is_abstract() {
            return Err(PipelineError::AbstractType(record_type.name().to_string()));
        }
        if self.is_registered(record_type) {
            return Err(PipelineError::AlreadyRegistered(
                record_type.name().to_string(),
            ));
        }
        if let Some(replacement) = record_type.replacement() {
            info!(replacement, "Skipping swapped record type");
            return Ok(None);
        }

        let builder = match explicit_index_name {
            Some(name) => builder.index(name),
            None => builder,
        };
        let descriptor = builder.build(record_type)?;
        let index = descriptor.index_name().to_string();

        self.create_index(&index, &descriptor.mapping()).await?;

        info!(
            index = %index,
            document_type = descriptor.document_type(),
            fields = descriptor.fields().len(),
            "Registered record type"
        );
        let key = record_type.name().to_string();
        self.descriptors.insert(key.clone(), descriptor);
        Ok(self.descriptors.get(&key))
    }

    /// Remove a record type's descriptor. The index itself is left alone.
    pub fn unregister(&mut self, record_type: &RecordType) -> Result<IndexDescriptor, PipelineError> {
        self.descriptors
            .remove(record_type.name())
            .ok_or_else(|| PipelineError::NotRegistered(record_type.name().to_string()))
    }

    pub fn is_registered(&self, record_type: &RecordType) -> bool {
        self.descriptors.contains_key(record_type.name())
    }

    /// The descriptor of a registered record type.
    pub fn get_index_instance(
        &self,
        record_type: &RecordType,
    ) -> Result<&IndexDescriptor, PipelineError> {
        self.descriptors
            .get(record_type.name())
            .ok_or_else(|| PipelineError::NotRegistered(record_type.name().to_string()))
    }

    /// The index name a record type's policy currently asks for.
    pub fn populate_index(&self, record_type: &RecordType) -> Result<String, PipelineError> {
        Ok(self.get_index_instance(record_type)?.populate_index())
    }

    /// Registered record type names.
    pub fn record_types(&self) -> impl Iterator<Item = &str> {
        self.descriptors.keys().map(String::as_str)
    }

    pub fn backend(&self) -> &Arc<dyn SearchBackend> {
        &self.backend
    }

    /// Resolve the index to write to, creating it when needed.
    ///
    /// A name never seen before for this record type is appended to the
    /// descriptor's history. Indices whose creation was deferred by an
    /// unreachable backend are created here.
    #[instrument(skip(self, record_type), fields(record_type = %record_type))]
    pub async fn ensure_current_index(
        &mut self,
        record_type: &RecordType,
    ) -> Result<String, PipelineError> {
        let descriptor = self
            .descriptors
            .get_mut(record_type.name())
            .ok_or_else(|| PipelineError::NotRegistered(record_type.name().to_string()))?;

        let index = descriptor.populate_index();
        if descriptor.push_index_name(&index) {
            info!(
                index = %index,
                previous = descriptor.index_names().len() - 1,
                "Index name changed, registering new index"
            );
        }

        if !self.created.contains(&index) {
            let mapping = descriptor.mapping();
            self.create_index(&index, &mapping).await?;
        }
        Ok(index)
    }

    /// Create `index`, tolerating an unreachable backend.
    async fn create_index(
        &mut self,
        index: &str,
        mapping: &IndexMapping,
    ) -> Result<(), PipelineError> {
        match self.backend.create_index(index, mapping).await {
            Ok(creation) => {
                if creation == IndexCreation::AlreadyExists {
                    info!(index, "Index already exists with a compatible mapping");
                }
                self.created.insert(index.to_string());
                Ok(())
            }
            Err(e) if e.is_connection() => {
                error!(
                    index,
                    error = %e,
                    "Cannot connect to search backend, index creation deferred"
                );
                Ok(())
            }
            Err(e) => {
                warn!(index, error = %e, "Index creation failed");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{FieldSpec, IndexNamePolicy};
    use model_indexer_repository::{InMemoryBackend, SearchError};
    use model_indexer_shared::{FieldMapping, SearchFieldType};
    use std::sync::Mutex;

    fn books() -> RecordType {
        RecordType::new("Book")
    }

    fn builder() -> IndexDescriptorBuilder {
        IndexDescriptor::builder()
            .index("library")
            .field(FieldSpec::attribute("title", SearchFieldType::Text))
    }

    fn registry() -> (Arc<InMemoryBackend>, IndexRegistry) {
        let backend = Arc::new(InMemoryBackend::new());
        let registry = IndexRegistry::new(backend.clone());
        (backend, registry)
    }

    #[tokio::test]
    async fn test_register_creates_index() {
        let (backend, mut registry) = registry();

        let descriptor = registry
            .register(&books(), builder(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(descriptor.index_name(), "library");

        assert!(registry.is_registered(&books()));
        let mapping = backend.mapping("library").await.unwrap();
        assert_eq!(mapping.document_type, "book");
        assert_eq!(mapping.fields[0].name, "title");
    }

    #[tokio::test]
    async fn test_types_without_index_get_separate_indices() {
        let (backend, mut registry) = registry();
        let authors = RecordType::new("Author");

        registry
            .register(
                &books(),
                IndexDescriptor::builder().field(FieldSpec::attribute("title", SearchFieldType::Text)),
                None,
            )
            .await
            .unwrap();
        registry
            .register(
                &authors,
                IndexDescriptor::builder().field(FieldSpec::attribute("name", SearchFieldType::Text)),
                None,
            )
            .await
            .unwrap();

        assert_eq!(
            registry.get_index_instance(&books()).unwrap().index_name(),
            "model_index-book"
        );
        assert_eq!(
            registry.get_index_instance(&authors).unwrap().index_name(),
            "model_index-author"
        );
        assert_eq!(
            backend.mapping("model_index-author").await.unwrap().fields[0].name,
            "name"
        );
    }

    #[tokio::test]
    async fn test_register_twice_keeps_first() {
        let (_, mut registry) = registry();
        registry.register(&books(), builder(), None).await.unwrap();

        let second = IndexDescriptor::builder()
            .index("other")
            .field(FieldSpec::attribute("isbn", SearchFieldType::Keyword));
        let result = registry.register(&books(), second, None).await;

        assert!(matches!(result, Err(PipelineError::AlreadyRegistered(_))));
        let descriptor = registry.get_index_instance(&books()).unwrap();
        assert_eq!(descriptor.index_name(), "library");
        assert_eq!(descriptor.fields()[0].name(), "title");
    }

    #[tokio::test]
    async fn test_abstract_and_swapped_types() {
        let (backend, mut registry) = registry();

        let result = registry
            .register(&RecordType::new("Base").mark_abstract(), builder(), None)
            .await;
        assert!(matches!(result, Err(PipelineError::AbstractType(_))));

        let swapped = RecordType::new("User").swapped_for("accounts.Member");
        let result = registry.register(&swapped, builder(), None).await.unwrap();
        assert!(result.is_none());
        assert!(!registry.is_registered(&swapped));
        assert!(backend.create_requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_explicit_index_name() {
        let (backend, mut registry) = registry();

        registry
            .register(&books(), builder(), Some("books-v3"))
            .await
            .unwrap();

        assert!(backend.has_index("books-v3").await);
        assert!(!backend.has_index("library").await);
    }

    #[tokio::test]
    async fn test_offline_backend_defers_creation() {
        let (backend, mut registry) = registry();
        backend.set_offline(true).await;

        registry.register(&books(), builder(), None).await.unwrap();
        assert!(registry.is_registered(&books()));
        assert!(!backend.has_index("library").await);

        backend.set_offline(false).await;
        let index = registry.ensure_current_index(&books()).await.unwrap();

        assert_eq!(index, "library");
        assert!(backend.has_index("library").await);
    }

    #[tokio::test]
    async fn test_mapping_conflict_blocks_registration() {
        let (backend, mut registry) = registry();
        backend
            .seed_index(
                "library",
                IndexMapping::new(
                    "book",
                    vec![FieldMapping::new("title", SearchFieldType::Keyword)],
                ),
            )
            .await;

        let result = registry.register(&books(), builder(), None).await;

        assert!(matches!(
            result,
            Err(PipelineError::SearchError(SearchError::MappingConflict { .. }))
        ));
        assert!(!registry.is_registered(&books()));
    }

    #[tokio::test]
    async fn test_rotation_appends_history() {
        let (backend, mut registry) = registry();
        let current = Arc::new(Mutex::new("events-1".to_string()));
        let policy_name = current.clone();
        let builder = IndexDescriptor::builder()
            .index_policy(IndexNamePolicy::custom(move || {
                policy_name.lock().map(|n| n.clone()).unwrap_or_default()
            }))
            .field(FieldSpec::attribute("title", SearchFieldType::Text));
        registry.register(&books(), builder, None).await.unwrap();

        *current.lock().unwrap() = "events-2".to_string();
        let index = registry.ensure_current_index(&books()).await.unwrap();

        assert_eq!(index, "events-2");
        assert_eq!(
            registry.get_index_instance(&books()).unwrap().index_names(),
            ["events-1", "events-2"].map(String::from)
        );
        assert_eq!(backend.create_requests().await, vec!["events-1", "events-2"]);

        // A known, created index is not requested again.
        registry.ensure_current_index(&books()).await.unwrap();
        assert_eq!(backend.create_requests().await.len(), 2);
    }

    #[tokio::test]
    async fn test_unregister() {
        let (_, mut registry) = registry();
        registry.register(&books(), builder(), None).await.unwrap();

        registry.unregister(&books()).unwrap();

        assert!(!registry.is_registered(&books()));
        assert!(matches!(
            registry.unregister(&books()),
            Err(PipelineError::NotRegistered(_))
        ));
    }
}
