//! The model indexer.
//!
//! Owns the registry, buffer, engine and interceptor, and exposes the entry
//! points a host application calls at startup (registration) and around its
//! record lifecycle events. Mutating calls take `&mut self`; hosts sharing one
//! indexer across tasks wrap it in their own lock.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::buffer::{ChangeBuffer, DEFAULT_BUFFER_SIZE};
use crate::descriptor::{IndexDescriptor, IndexDescriptorBuilder};
use crate::engine::{BulkSyncEngine, SyncItems, SyncOptions, SyncReport};
use crate::errors::PipelineError;
use crate::interceptor::{ChangeInterceptor, SignalProcessor};
use crate::record::{Record, RecordStore, RecordType};
use crate::registry::IndexRegistry;
use crate::serializer::DocumentSerializer;
use crate::template::TemplateRenderer;
use model_indexer_repository::SearchBackend;
use model_indexer_shared::OperationKind;

/// Runtime settings of a [`ModelIndexer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerConfig {
    /// Records buffered per record type before a flush.
    pub buffer_size: usize,
    pub signal_processor: SignalProcessor,
    /// Refresh the index after hook-triggered writes.
    pub refresh: bool,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            signal_processor: SignalProcessor::Base,
            refresh: true,
        }
    }
}

/// Mirrors record changes into the search index.
pub struct ModelIndexer {
    registry: IndexRegistry,
    engine: BulkSyncEngine,
    buffer: ChangeBuffer,
    interceptor: ChangeInterceptor,
    store: Arc<dyn RecordStore>,
    config: IndexerConfig,
}

impl ModelIndexer {
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        store: Arc<dyn RecordStore>,
        templates: Arc<dyn TemplateRenderer>,
        config: IndexerConfig,
    ) -> Self {
        let serializer = DocumentSerializer::new(Arc::clone(&store), templates);
        Self {
            registry: IndexRegistry::new(Arc::clone(&backend)),
            engine: BulkSyncEngine::new(backend, serializer),
            buffer: ChangeBuffer::new(config.buffer_size),
            interceptor: ChangeInterceptor::new(config.signal_processor.clone()),
            store,
            config,
        }
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub fn registry(&self) -> &IndexRegistry {
        &self.registry
    }

    /// Register a record type and connect its hooks.
    pub async fn register(
        &mut self,
        record_type: &RecordType,
        builder: IndexDescriptorBuilder,
    ) -> Result<Option<&IndexDescriptor>, PipelineError> {
        self.register_with_index(record_type, builder, None).await
    }

    /// Register a record type on an explicit index and connect its hooks.
    pub async fn register_with_index(
        &mut self,
        record_type: &RecordType,
        builder: IndexDescriptorBuilder,
        index_name: Option<&str>,
    ) -> Result<Option<&IndexDescriptor>, PipelineError> {
        let registered = self
            .registry
            .register(record_type, builder, index_name)
            .await?;
        if registered.is_some() {
            self.interceptor.connect(record_type);
        }
        Ok(registered)
    }

    /// Unregister a record type, dropping its pending batch unflushed.
    pub fn unregister(&mut self, record_type: &RecordType) -> Result<(), PipelineError> {
        self.registry.unregister(record_type)?;
        self.interceptor.disconnect(record_type);
        if let Some(batch) = self.buffer.remove(record_type) {
            if !batch.is_empty() {
                warn!(
                    record_type = %record_type,
                    dropped = batch.len(),
                    "Unregistered record type had pending records"
                );
            }
        }
        Ok(())
    }

    /// Resume handling hooks of a registered record type.
    pub fn connect(&mut self, record_type: &RecordType) -> Result<(), PipelineError> {
        self.registry.get_index_instance(record_type)?;
        self.interceptor.connect(record_type);
        Ok(())
    }

    /// Ignore hooks of `record_type` until reconnected.
    pub fn disconnect(&mut self, record_type: &RecordType) -> bool {
        self.interceptor.disconnect(record_type)
    }

    pub fn is_connected(&self, record_type: &RecordType) -> bool {
        self.interceptor.is_connected(record_type)
    }

    /// Records waiting in the buffer for `record_type`.
    pub fn pending(&self, record_type: &RecordType) -> usize {
        self.buffer.pending(record_type)
    }

    fn is_active(&self, record_type: &RecordType) -> bool {
        if !self.interceptor.is_connected(record_type) {
            debug!(record_type = %record_type, "Record type not connected, ignoring hook");
            return false;
        }
        true
    }

    /// Hook called before a record is saved.
    pub async fn on_pre_save(
        &mut self,
        record_type: &RecordType,
        record: &dyn Record,
    ) -> Result<(), PipelineError> {
        if !self.is_active(record_type) {
            return Ok(());
        }
        let descriptor = self.registry.get_index_instance(record_type)?;
        self.interceptor
            .pre_save(self.store.as_ref(), descriptor, record)
            .await
    }

    /// Hook called after a record is saved.
    ///
    /// Returns the flush report when the save filled the buffer.
    #[instrument(skip(self, record_type, record), fields(record_type = %record_type))]
    pub async fn on_post_save(
        &mut self,
        record_type: &RecordType,
        record: Arc<dyn Record>,
        created: bool,
    ) -> Result<Option<SyncReport>, PipelineError> {
        if !self.is_active(record_type) {
            return Ok(None);
        }
        let descriptor = self.registry.get_index_instance(record_type)?;
        if !self
            .interceptor
            .should_index(descriptor, record.as_ref(), created)
        {
            debug!("Save does not need indexing");
            return Ok(None);
        }

        self.buffer
            .enqueue(
                &self.engine,
                &mut self.registry,
                record_type,
                record,
                created,
                self.config.refresh,
            )
            .await
    }

    /// Hook called before a record is deleted.
    ///
    /// Buffered entries for the record are dropped and its document is
    /// deleted right away. Returns whether a document was removed.
    #[instrument(skip(self, record_type, record), fields(record_type = %record_type))]
    pub async fn on_pre_delete(
        &mut self,
        record_type: &RecordType,
        record: &dyn Record,
    ) -> Result<bool, PipelineError> {
        if !self.is_active(record_type) {
            return Ok(false);
        }
        let descriptor = self.registry.get_index_instance(record_type)?;
        let Some(id) = descriptor.record_id(record) else {
            warn!("Deleted record has no id, nothing to remove from the index");
            return Ok(false);
        };

        let dropped = self.buffer.discard(descriptor, &id);
        if dropped > 0 {
            debug!(id = %id, dropped, "Dropped buffered entries of deleted record");
        }

        self.engine
            .delete_document(&mut self.registry, record_type, &id, self.config.refresh)
            .await
    }

    /// Index or delete items directly, bypassing the buffer.
    pub async fn sync(
        &mut self,
        record_type: &RecordType,
        items: SyncItems,
        action: OperationKind,
        options: &SyncOptions,
    ) -> Result<SyncReport, PipelineError> {
        self.engine
            .sync(&mut self.registry, record_type, items, action, options)
            .await
    }

    /// Write the pending batch of `record_type` now.
    pub async fn flush(
        &mut self,
        record_type: &RecordType,
    ) -> Result<Option<SyncReport>, PipelineError> {
        self.buffer
            .flush(
                &self.engine,
                &mut self.registry,
                record_type,
                self.config.refresh,
            )
            .await
    }

    /// Write every pending batch, e.g. before shutdown.
    pub async fn flush_all(&mut self) -> Result<Vec<SyncReport>, PipelineError> {
        self.buffer
            .flush_all(&self.engine, &mut self.registry, self.config.refresh)
            .await
    }

    /// Rebuild the index of `record_type` from the record store.
    ///
    /// Walks the store one page of `bulk_size` records at a time and refreshes
    /// once at the end when `options.refresh` is set.
    #[instrument(skip(self, record_type, options), fields(record_type = %record_type))]
    pub async fn reindex_all(
        &mut self,
        record_type: &RecordType,
        options: &SyncOptions,
    ) -> Result<SyncReport, PipelineError> {
        if options.bulk_size == 0 {
            return Err(PipelineError::invalid_argument("bulk_size must be at least 1"));
        }
        let index_name = self.registry.ensure_current_index(record_type).await?;

        let mut total = self.store.count(record_type).await?;
        if let Some(max_items) = options.max_items {
            total = total.min(max_items);
        }
        info!(total, index = %index_name, "Rebuilding index");

        let page_options = options.clone().with_refresh(false);
        let mut report = SyncReport {
            index_name: index_name.clone(),
            ..SyncReport::default()
        };
        let mut offset = 0;
        while offset < total {
            let limit = options.bulk_size.min(total - offset);
            let records = self.store.fetch_page(record_type, offset, limit).await?;
            if records.is_empty() {
                break;
            }
            offset += records.len();
            let page = self
                .engine
                .sync(
                    &mut self.registry,
                    record_type,
                    SyncItems::Records(records),
                    OperationKind::Index,
                    &page_options,
                )
                .await?;
            report.merge(page);
        }

        if options.refresh && report.windows > 0 {
            self.registry.backend().refresh(&index_name).await?;
        }
        info!(
            indexed = report.indexed,
            skipped = report.skipped,
            "Index rebuilt"
        );
        Ok(report)
    }

    /// Whether the search backend is reachable and healthy.
    pub async fn health_check(&self) -> Result<bool, PipelineError> {
        Ok(self.registry.backend().health_check().await?)
    }
}
