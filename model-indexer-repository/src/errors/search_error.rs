//! Search error types.
//!
//! This module defines the error types that can occur while talking to the
//! search backend.

use thiserror::Error;

/// Errors that can occur during search backend operations.
#[derive(Error, Debug, Clone)]
pub enum SearchError {
    /// The backend could not be reached.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The index already exists with a mapping that differs from the desired one.
    ///
    /// Requires operator migration; never resolved automatically.
    #[error("Mapping conflict on index {index}: {reason}")]
    MappingConflict { index: String, reason: String },

    /// Index creation was rejected for a reason other than a mapping conflict.
    #[error("Index creation error: {0}")]
    IndexCreationError(String),

    /// One or more documents of a bulk request were rejected.
    #[error("Bulk operation on index {index} failed for {failed} document(s): {}", reasons.join("; "))]
    BulkOperationError {
        index: String,
        failed: usize,
        reasons: Vec<String>,
    },

    /// Failed to delete a document.
    #[error("Delete error: {0}")]
    DeleteError(String),

    /// Failed to refresh an index.
    #[error("Refresh error: {0}")]
    RefreshError(String),

    /// Document or index not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Failed to parse a response from the backend.
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl SearchError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a mapping conflict error.
    pub fn mapping_conflict(index: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MappingConflict {
            index: index.into(),
            reason: reason.into(),
        }
    }

    /// Create an index creation error.
    pub fn index_creation(msg: impl Into<String>) -> Self {
        Self::IndexCreationError(msg.into())
    }

    /// Create a bulk operation error.
    pub fn bulk_operation(index: impl Into<String>, reasons: Vec<String>) -> Self {
        Self::BulkOperationError {
            index: index.into(),
            failed: reasons.len(),
            reasons,
        }
    }

    /// Create a delete error.
    pub fn delete(msg: impl Into<String>) -> Self {
        Self::DeleteError(msg.into())
    }

    /// Create a refresh error.
    pub fn refresh(msg: impl Into<String>) -> Self {
        Self::RefreshError(msg.into())
    }

    /// Create a not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Whether the backend was unreachable.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::ConnectionError(_))
    }

    /// Whether the addressed document or index does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
