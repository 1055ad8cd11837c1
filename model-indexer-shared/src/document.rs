//! Documents and the bulk operations that carry them to the search backend.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A serialized record, keyed by field name in descriptor order.
pub type Document = serde_json::Map<String, Value>;

/// Identifier of a document in the search index.
///
/// Record identifiers of any scalar type are string-cast before they reach the
/// backend, so `7` and `"7"` address the same document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Create an identifier from its string form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Convert a JSON attribute value into an identifier.
    ///
    /// Returns `None` for `null`, which lets the backend assign an id.
    /// Arrays and objects are not valid identifiers and also yield `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            Value::Bool(b) => Some(Self(b.to_string())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Borrow the string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<i32> for DocumentId {
    fn from(id: i32) -> Self {
        Self(id.to_string())
    }
}

impl From<i64> for DocumentId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<u64> for DocumentId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<Uuid> for DocumentId {
    fn from(id: Uuid) -> Self {
        Self(id.to_string())
    }
}

/// The kind of a bulk operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Create or overwrite a document.
    Index,
    /// Remove a document.
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index => f.write_str("index"),
            Self::Delete => f.write_str("delete"),
        }
    }
}

/// One entry of a bulk request. Built per flush and never stored.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkOperation {
    /// Index `document`, under `id` when one is known.
    Index {
        id: Option<DocumentId>,
        document: Document,
    },
    /// Delete the document with `id`.
    Delete { id: DocumentId },
}

impl BulkOperation {
    /// Create an index operation.
    pub fn index(id: Option<DocumentId>, document: Document) -> Self {
        Self::Index { id, document }
    }

    /// Create a delete operation.
    pub fn delete(id: impl Into<DocumentId>) -> Self {
        Self::Delete { id: id.into() }
    }

    /// The operation kind.
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Index { .. } => OperationKind::Index,
            Self::Delete { .. } => OperationKind::Delete,
        }
    }

    /// The target document id, if any.
    pub fn document_id(&self) -> Option<&DocumentId> {
        match self {
            Self::Index { id, .. } => id.as_ref(),
            Self::Delete { id } => Some(id),
        }
    }

    /// The document body. Only index operations carry one.
    pub fn document(&self) -> Option<&Document> {
        match self {
            Self::Index { document, .. } => Some(document),
            Self::Delete { .. } => None,
        }
    }
}
