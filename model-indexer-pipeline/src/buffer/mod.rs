//! Change buffer.
//!
//! Accumulates records awaiting indexing, one batch per record type, and
//! flushes a batch through the bulk sync engine once it holds `buffer_size`
//! entries. Batches live in memory only; entries not yet flushed are lost if
//! the process dies.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::descriptor::IndexDescriptor;
use crate::engine::{BulkSyncEngine, SyncItems, SyncOptions, SyncReport};
use crate::errors::PipelineError;
use crate::record::{Record, RecordType};
use crate::registry::IndexRegistry;
use model_indexer_shared::{DocumentId, OperationKind};

/// Default number of records buffered per record type before a flush.
pub const DEFAULT_BUFFER_SIZE: usize = 100;

/// A buffered record.
#[derive(Clone)]
pub struct PendingEntry {
    /// The live record; it is serialized with its state at flush time.
    pub record: Arc<dyn Record>,
    pub is_creation: bool,
}

/// Records of one type waiting to be indexed, in arrival order.
#[derive(Clone)]
pub struct PendingBatch {
    record_type: RecordType,
    entries: Vec<PendingEntry>,
}

impl PendingBatch {
    fn new(record_type: RecordType) -> Self {
        Self {
            record_type,
            entries: Vec::new(),
        }
    }

    pub fn record_type(&self) -> &RecordType {
        &self.record_type
    }

    pub fn entries(&self) -> &[PendingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn records(&self) -> Vec<Arc<dyn Record>> {
        self.entries.iter().map(|e| Arc::clone(&e.record)).collect()
    }
}

/// Per record type pending batches.
pub struct ChangeBuffer {
    buffer_size: usize,
    batches: HashMap<String, PendingBatch>,
}

impl Default for ChangeBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

impl ChangeBuffer {
    /// Create a buffer flushing every `buffer_size` records. Zero is treated
    /// as one.
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
            batches: HashMap::new(),
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Number of records waiting for `record_type`.
    pub fn pending(&self, record_type: &RecordType) -> usize {
        self.batches
            .get(record_type.name())
            .map(PendingBatch::len)
            .unwrap_or(0)
    }

    pub fn batch(&self, record_type: &RecordType) -> Option<&PendingBatch> {
        self.batches.get(record_type.name())
    }

    /// Buffer a record, flushing the batch when it is full.
    ///
    /// Records failing the descriptor's predicate are not buffered. Returns
    /// the flush report when this call triggered one.
    #[instrument(skip_all, fields(record_type = %record_type, is_creation = is_creation))]
    pub async fn enqueue(
        &mut self,
        engine: &BulkSyncEngine,
        registry: &mut IndexRegistry,
        record_type: &RecordType,
        record: Arc<dyn Record>,
        is_creation: bool,
        refresh: bool,
    ) -> Result<Option<SyncReport>, PipelineError> {
        let descriptor = registry.get_index_instance(record_type)?;
        if !descriptor.matches(record.as_ref()) {
            debug!("Record does not qualify for indexing, not buffered");
            return Ok(None);
        }

        let batch = self
            .batches
            .entry(record_type.name().to_string())
            .or_insert_with(|| PendingBatch::new(record_type.clone()));
        batch.entries.push(PendingEntry {
            record,
            is_creation,
        });

        if batch.len() < self.buffer_size {
            return Ok(None);
        }
        self.flush(engine, registry, record_type, refresh).await
    }

    /// Write the pending batch of `record_type`, if any.
    ///
    /// The batch is cleared only once the write succeeded, so a failed flush
    /// is retried with the next trigger.
    #[instrument(skip_all, fields(record_type = %record_type))]
    pub async fn flush(
        &mut self,
        engine: &BulkSyncEngine,
        registry: &mut IndexRegistry,
        record_type: &RecordType,
        refresh: bool,
    ) -> Result<Option<SyncReport>, PipelineError> {
        let records = match self.batches.get(record_type.name()) {
            Some(batch) if !batch.is_empty() => batch.records(),
            _ => return Ok(None),
        };
        let count = records.len();

        let options = SyncOptions::default()
            .with_bulk_size(self.buffer_size)
            .with_refresh(refresh);
        let report = engine
            .sync(
                registry,
                record_type,
                SyncItems::Records(records),
                OperationKind::Index,
                &options,
            )
            .await?;

        if let Some(batch) = self.batches.get_mut(record_type.name()) {
            batch.entries.clear();
        }
        info!(count, indexed = report.indexed, "Flushed pending batch");
        Ok(Some(report))
    }

    /// Flush every pending batch, e.g. before shutdown.
    pub async fn flush_all(
        &mut self,
        engine: &BulkSyncEngine,
        registry: &mut IndexRegistry,
        refresh: bool,
    ) -> Result<Vec<SyncReport>, PipelineError> {
        let mut record_types: Vec<RecordType> = self
            .batches
            .values()
            .filter(|batch| !batch.is_empty())
            .map(|batch| batch.record_type.clone())
            .collect();
        record_types.sort_by(|a, b| a.name().cmp(b.name()));

        let mut reports = Vec::with_capacity(record_types.len());
        for record_type in &record_types {
            if let Some(report) = self.flush(engine, registry, record_type, refresh).await? {
                reports.push(report);
            }
        }
        Ok(reports)
    }

    /// Drop buffered entries for the record with `id`.
    ///
    /// Used before deleting a document so a stale update cannot re-index it.
    pub fn discard(&mut self, descriptor: &IndexDescriptor, id: &DocumentId) -> usize {
        let Some(batch) = self.batches.get_mut(descriptor.record_type().name()) else {
            return 0;
        };
        let before = batch.entries.len();
        batch
            .entries
            .retain(|entry| descriptor.record_id(entry.record.as_ref()).as_ref() != Some(id));
        before - batch.entries.len()
    }

    /// Drop the batch of an unregistered record type.
    pub(crate) fn remove(&mut self, record_type: &RecordType) -> Option<PendingBatch> {
        self.batches.remove(record_type.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::FieldSpec;
    use crate::record::InMemoryRecordStore;
    use crate::serializer::DocumentSerializer;
    use crate::template::TemplateRegistry;
    use model_indexer_repository::InMemoryBackend;
    use model_indexer_shared::SearchFieldType;
    use serde_json::{json, Value};

    fn record(value: Value) -> Arc<dyn Record> {
        Arc::new(value.as_object().cloned().unwrap())
    }

    fn books() -> RecordType {
        RecordType::new("Book")
    }

    async fn setup() -> (Arc<InMemoryBackend>, IndexRegistry, BulkSyncEngine) {
        let backend = Arc::new(InMemoryBackend::new());
        let serializer = DocumentSerializer::new(
            Arc::new(InMemoryRecordStore::new()),
            Arc::new(TemplateRegistry::new()),
        );
        let engine = BulkSyncEngine::new(backend.clone(), serializer);
        let mut registry = IndexRegistry::new(backend.clone());
        let builder = IndexDescriptor::builder()
            .index("library")
            .field(FieldSpec::attribute("title", SearchFieldType::Text))
            .matches(|record| record.attribute("draft") != Some(json!(true)));
        registry.register(&books(), builder, None).await.unwrap();
        (backend, registry, engine)
    }

    #[tokio::test]
    async fn test_buffer_size_two_flushes_once() {
        let (backend, mut registry, engine) = setup().await;
        let mut buffer = ChangeBuffer::new(2);

        let first = buffer
            .enqueue(&engine, &mut registry, &books(), record(json!({"pk": 1, "title": "A"})), true, true)
            .await
            .unwrap();
        assert!(first.is_none());
        assert_eq!(buffer.pending(&books()), 1);

        let second = buffer
            .enqueue(&engine, &mut registry, &books(), record(json!({"pk": 2, "title": "B"})), true, true)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(second.windows, 1);
        assert_eq!(second.indexed, 2);
        assert_eq!(buffer.pending(&books()), 0);
        let requests = backend.bulk_requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].operations.len(), 2);
    }

    #[tokio::test]
    async fn test_non_qualifying_record_is_not_buffered() {
        let (_, mut registry, engine) = setup().await;
        let mut buffer = ChangeBuffer::new(10);

        buffer
            .enqueue(&engine, &mut registry, &books(), record(json!({"pk": 1, "draft": true})), true, true)
            .await
            .unwrap();

        assert_eq!(buffer.pending(&books()), 0);
    }

    #[tokio::test]
    async fn test_failed_flush_keeps_batch() {
        let (backend, mut registry, engine) = setup().await;
        let mut buffer = ChangeBuffer::new(1);
        backend.set_offline(true).await;

        let result = buffer
            .enqueue(&engine, &mut registry, &books(), record(json!({"pk": 1, "title": "A"})), false, true)
            .await;
        assert!(result.unwrap_err().is_connection());
        assert_eq!(buffer.pending(&books()), 1);

        backend.set_offline(false).await;
        let report = buffer
            .flush(&engine, &mut registry, &books(), true)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.indexed, 1);
        assert_eq!(buffer.pending(&books()), 0);
    }

    #[tokio::test]
    async fn test_flush_without_refresh() {
        let (backend, mut registry, engine) = setup().await;
        let mut buffer = ChangeBuffer::new(5);

        buffer
            .enqueue(&engine, &mut registry, &books(), record(json!({"pk": 1, "title": "A"})), true, false)
            .await
            .unwrap();
        buffer.flush_all(&engine, &mut registry, false).await.unwrap();

        let document = backend.document("library", "1").await.unwrap();
        assert_eq!(document["title"], json!("A"));
        assert!(backend.refreshes().await.is_empty());
    }

    #[tokio::test]
    async fn test_flush_all_and_empty_flush() {
        let (_, mut registry, engine) = setup().await;
        let mut buffer = ChangeBuffer::new(10);

        assert!(buffer
            .flush(&engine, &mut registry, &books(), true)
            .await
            .unwrap()
            .is_none());

        for pk in 1..=3 {
            buffer
                .enqueue(
                    &engine,
                    &mut registry,
                    &books(),
                    record(json!({"pk": pk, "title": format!("T{}", pk)})),
                    true,
                    true,
                )
                .await
                .unwrap();
        }
        let reports = buffer.flush_all(&engine, &mut registry, true).await.unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].indexed, 3);
        assert_eq!(buffer.pending(&books()), 0);
    }

    #[tokio::test]
    async fn test_discard_removes_entries_for_id() {
        let (_, mut registry, engine) = setup().await;
        let mut buffer = ChangeBuffer::new(10);
        for pk in [1, 2, 1] {
            buffer
                .enqueue(&engine, &mut registry, &books(), record(json!({"pk": pk})), false, true)
                .await
                .unwrap();
        }

        let descriptor = registry.get_index_instance(&books()).unwrap();
        let dropped = buffer.discard(descriptor, &DocumentId::from(1i64));

        assert_eq!(dropped, 2);
        assert_eq!(buffer.pending(&books()), 1);
    }

    #[test]
    fn test_zero_buffer_size_is_one() {
        assert_eq!(ChangeBuffer::new(0).buffer_size(), 1);
        assert_eq!(ChangeBuffer::default().buffer_size(), DEFAULT_BUFFER_SIZE);
    }
}
