//! # Model Indexer Shared
//!
//! Types shared between the pipeline and the search backend implementations:
//! serialized documents, bulk operations, record identifiers and the index
//! mapping model.

pub mod document;
pub mod mapping;

pub use document::{BulkOperation, Document, DocumentId, OperationKind};
pub use mapping::{AnalyzerDefinition, FieldMapping, IndexMapping, SearchFieldType};
