//! Bulk sync engine.
//!
//! Writes batches of records (or deletion keys) to the search backend in
//! consecutive bulk windows, then optionally refreshes the index so the
//! changes are visible to the next read.

use std::ops::Range;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::descriptor::IndexDescriptor;
use crate::errors::PipelineError;
use crate::record::{Record, RecordType};
use crate::registry::IndexRegistry;
use crate::serializer::DocumentSerializer;
use model_indexer_repository::SearchBackend;
use model_indexer_shared::{BulkOperation, DocumentId, OperationKind};

/// Default number of operations per bulk request.
pub const DEFAULT_BULK_SIZE: usize = 100;

/// Items handed to [`BulkSyncEngine::sync`].
#[derive(Clone)]
pub enum SyncItems {
    /// Live records, serialized with their current state.
    Records(Vec<Arc<dyn Record>>),
    /// Identifiers. Deletes use them as keys; indexing fetches each record.
    Ids(Vec<DocumentId>),
}

impl SyncItems {
    pub fn ids<I, T>(ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<DocumentId>,
    {
        Self::Ids(ids.into_iter().map(Into::into).collect())
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Records(records) => records.len(),
            Self::Ids(ids) => ids.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Options of one sync call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Operations per bulk request. Must be at least 1.
    pub bulk_size: usize,
    /// Only process the first `max_items` items.
    pub max_items: Option<usize>,
    /// Refresh the index once every window is written.
    pub refresh: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            bulk_size: DEFAULT_BULK_SIZE,
            max_items: None,
            refresh: true,
        }
    }
}

impl SyncOptions {
    pub fn with_bulk_size(mut self, bulk_size: usize) -> Self {
        self.bulk_size = bulk_size;
        self
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = Some(max_items);
        self
    }

    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }
}

/// What a sync call wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub index_name: String,
    /// Bulk requests submitted.
    pub windows: usize,
    pub indexed: usize,
    pub deleted: usize,
    /// Records left out because they failed the qualifying predicate.
    pub skipped: usize,
}

impl SyncReport {
    fn empty(index_name: String) -> Self {
        Self {
            index_name,
            ..Self::default()
        }
    }

    /// Fold another report for the same index into this one.
    pub fn merge(&mut self, other: SyncReport) {
        self.windows += other.windows;
        self.indexed += other.indexed;
        self.deleted += other.deleted;
        self.skipped += other.skipped;
    }
}

/// Splits `total` items into consecutive windows of `bulk_size`.
///
/// Every window holds `bulk_size` items except possibly the last.
pub fn window_ranges(total: usize, bulk_size: usize) -> Vec<Range<usize>> {
    if bulk_size == 0 {
        return Vec::new();
    }
    (0..total)
        .step_by(bulk_size)
        .map(|start| start..(start + bulk_size).min(total))
        .collect()
}

/// Serializes items and writes them in bulk windows.
#[derive(Clone)]
pub struct BulkSyncEngine {
    backend: Arc<dyn SearchBackend>,
    serializer: DocumentSerializer,
}

impl BulkSyncEngine {
    pub fn new(backend: Arc<dyn SearchBackend>, serializer: DocumentSerializer) -> Self {
        Self {
            backend,
            serializer,
        }
    }

    pub fn serializer(&self) -> &DocumentSerializer {
        &self.serializer
    }

    /// Index or delete `items` for a registered record type.
    ///
    /// Deletes accept identifiers only. Each window is one bulk request; a
    /// rejected document fails that window and the call, leaving later
    /// windows unsent. Windows are not retried.
    #[instrument(
        skip(self, registry, record_type, items, options),
        fields(record_type = %record_type, items = items.len())
    )]
    pub async fn sync(
        &self,
        registry: &mut IndexRegistry,
        record_type: &RecordType,
        items: SyncItems,
        action: OperationKind,
        options: &SyncOptions,
    ) -> Result<SyncReport, PipelineError> {
        if options.bulk_size == 0 {
            return Err(PipelineError::invalid_argument("bulk_size must be at least 1"));
        }
        if action == OperationKind::Delete && matches!(items, SyncItems::Records(_)) {
            return Err(PipelineError::invalid_argument(
                "delete expects document identifiers, not records",
            ));
        }
        if items.is_empty() {
            let index_name = registry.get_index_instance(record_type)?.index_name().to_string();
            return Ok(SyncReport::empty(index_name));
        }

        let index = registry.ensure_current_index(record_type).await?;
        let descriptor = registry.get_index_instance(record_type)?;

        let mut total = items.len();
        if let Some(max_items) = options.max_items {
            if max_items < total {
                warn!(action = %action, max_items, "Limiting the number of items");
                total = max_items;
            }
        }
        info!(action = %action, total, index = %index, "Syncing documents");

        let mut report = SyncReport::empty(index.clone());
        for window in window_ranges(total, options.bulk_size) {
            info!(
                action = %action,
                from = window.start,
                to = window.end,
                total,
                index = %index,
                "Documents {} to {} of {} total",
                window.start,
                window.end,
                total
            );

            let operations = match &items {
                SyncItems::Ids(ids) if action == OperationKind::Delete => ids[window]
                    .iter()
                    .cloned()
                    .map(BulkOperation::delete)
                    .collect(),
                SyncItems::Ids(ids) => {
                    self.index_ids(descriptor, &ids[window], &mut report).await?
                }
                SyncItems::Records(records) => {
                    self.index_records(descriptor, &records[window], &mut report)?
                }
            };

            if operations.is_empty() {
                debug!("Window has no qualifying records, skipping");
                continue;
            }

            let summary = self
                .backend
                .bulk(&index, descriptor.document_type(), &operations)
                .await?;
            report.windows += 1;
            report.indexed += summary.indexed;
            report.deleted += summary.deleted;
        }

        if options.refresh && report.windows > 0 {
            self.backend.refresh(&index).await?;
        }

        Ok(report)
    }

    fn index_records(
        &self,
        descriptor: &IndexDescriptor,
        records: &[Arc<dyn Record>],
        report: &mut SyncReport,
    ) -> Result<Vec<BulkOperation>, PipelineError> {
        let mut operations = Vec::with_capacity(records.len());
        for record in records {
            if !descriptor.matches(record.as_ref()) {
                report.skipped += 1;
                continue;
            }
            let document = self.serializer.serialize_record(descriptor, record.as_ref())?;
            operations.push(BulkOperation::index(
                descriptor.record_id(record.as_ref()),
                document,
            ));
        }
        Ok(operations)
    }

    async fn index_ids(
        &self,
        descriptor: &IndexDescriptor,
        ids: &[DocumentId],
        report: &mut SyncReport,
    ) -> Result<Vec<BulkOperation>, PipelineError> {
        let mut operations = Vec::with_capacity(ids.len());
        for id in ids {
            let record = self.serializer.load(descriptor, id).await?;
            if !descriptor.matches(record.as_ref()) {
                report.skipped += 1;
                continue;
            }
            let document = self.serializer.serialize_record(descriptor, record.as_ref())?;
            let document_id = descriptor
                .record_id(record.as_ref())
                .unwrap_or_else(|| id.clone());
            operations.push(BulkOperation::index(Some(document_id), document));
        }
        Ok(operations)
    }

    /// Delete one document right away.
    ///
    /// Deleting a document the index does not hold is logged and ignored.
    /// Returns whether a document was removed.
    #[instrument(skip(self, registry, record_type), fields(record_type = %record_type, id = %id))]
    pub async fn delete_document(
        &self,
        registry: &mut IndexRegistry,
        record_type: &RecordType,
        id: &DocumentId,
        refresh: bool,
    ) -> Result<bool, PipelineError> {
        let index = registry.ensure_current_index(record_type).await?;
        let descriptor = registry.get_index_instance(record_type)?;

        let removed = match self
            .backend
            .delete_document(&index, descriptor.document_type(), id)
            .await
        {
            Ok(()) => true,
            Err(e) if e.is_not_found() => {
                warn!(
                    index = %index,
                    error = %e,
                    "Could not delete document, it is not in the index"
                );
                false
            }
            Err(e) => return Err(e.into()),
        };

        if refresh {
            self.backend.refresh(&index).await?;
        }
        Ok(removed)
    }
}
