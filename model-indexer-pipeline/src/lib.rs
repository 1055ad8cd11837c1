//! # Model Indexer Pipeline
//!
//! This crate mirrors changes to application records into search index
//! documents.
//!
//! ## Architecture
//!
//! The pipeline follows the Interceptor-Buffer-Engine pattern:
//!
//! 1. **Interceptor**: Receives create/update/delete hooks from the host
//! 2. **Buffer**: Accumulates pending records per record type
//! 3. **Engine**: Serializes records and writes them in bulk windows
//! 4. **Registry**: Maps record types to descriptors and index names
//! 5. **Indexer**: Owns the components and exposes the hook entry points

pub mod buffer;
pub mod descriptor;
pub mod engine;
pub mod errors;
pub mod indexer;
pub mod interceptor;
pub mod record;
pub mod registry;
pub mod schema;
pub mod serializer;
pub mod template;

pub use buffer::{ChangeBuffer, PendingBatch, PendingEntry, DEFAULT_BUFFER_SIZE};
pub use descriptor::{
    ExtractionRule, FieldFn, FieldSpec, IndexDescriptor, IndexDescriptorBuilder, IndexNamePolicy,
    Predicate,
};
pub use engine::{window_ranges, BulkSyncEngine, SyncItems, SyncOptions, SyncReport};
pub use errors::PipelineError;
pub use indexer::{IndexerConfig, ModelIndexer};
pub use interceptor::{ChangeInterceptor, SignalProcessor, DEFAULT_TRACKED_FIELD};
pub use record::{InMemoryRecordStore, Record, RecordStore, RecordType};
pub use registry::IndexRegistry;
pub use schema::{Column, ColumnType, SchemaResolver};
pub use serializer::{DocumentSerializer, SerializeTarget};
pub use template::{TemplateRegistry, TemplateRenderer};
