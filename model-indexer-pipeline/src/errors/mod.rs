//! Error types for the model indexer pipeline.

use model_indexer_repository::SearchError;
use thiserror::Error;

/// Errors that can occur in the model indexer pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Invalid descriptor or settings. Fatal at registration.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The record type already has a descriptor.
    #[error("Record type {0} is already registered")]
    AlreadyRegistered(String),

    /// The record type has no descriptor.
    #[error("Record type {0} is not registered")]
    NotRegistered(String),

    /// Abstract record types cannot be indexed.
    #[error("Record type {0} is abstract and cannot be registered")]
    AbstractType(String),

    /// Serialization by id found no row.
    #[error("No {record_type} record with id {id}")]
    RecordNotFound { record_type: String, id: String },

    /// A field's extraction rule failed.
    #[error("Could not compute value of field {field}: {reason}")]
    FieldExtraction { field: String, reason: String },

    /// A caller passed arguments the operation cannot accept.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Error reported by the record store.
    #[error("Record store error: {0}")]
    StoreError(String),

    /// Error rendering a template.
    #[error("Template error: {0}")]
    TemplateError(String),

    /// Error from the search backend.
    #[error("Search error: {0}")]
    SearchError(#[from] SearchError),
}

impl PipelineError {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::ConfigurationError(msg.into())
    }

    /// Create a record not found error.
    pub fn record_not_found(record_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::RecordNotFound {
            record_type: record_type.into(),
            id: id.into(),
        }
    }

    /// Create a field extraction error.
    pub fn field_extraction(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FieldExtraction {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a record store error.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreError(msg.into())
    }

    /// Create a template error.
    pub fn template(msg: impl Into<String>) -> Self {
        Self::TemplateError(msg.into())
    }

    /// Whether the search backend was unreachable.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::SearchError(e) if e.is_connection())
    }
}
