//! Records, record types and the record store seam.
//!
//! A record is a row from the host application's data store. The pipeline
//! only reads records through named attributes, so any entity type, or a
//! plain JSON object, can be indexed.

mod store;

use std::fmt;

use serde_json::Value;

pub use store::{InMemoryRecordStore, RecordStore};

/// Read access to one record.
pub trait Record: Send + Sync {
    /// Value of the named attribute, or `None` if the record has no such
    /// attribute. Computed attributes are evaluated on each call.
    fn attribute(&self, name: &str) -> Option<Value>;

    /// Names of the fields modified since the record was loaded, for records
    /// that track their own changes. `None` means the record cannot tell.
    fn changed_fields(&self) -> Option<Vec<String>> {
        None
    }
}

/// Plain key-value records resolve attributes by key lookup.
impl Record for serde_json::Map<String, Value> {
    fn attribute(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

/// Identifies a kind of record, like a table or model class.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordType {
    name: String,
    is_abstract: bool,
    swapped_for: Option<String>,
}

impl RecordType {
    /// Create a concrete record type.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_abstract: false,
            swapped_for: None,
        }
    }

    /// Mark the type as abstract. Abstract types cannot be registered.
    pub fn mark_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Mark the type as replaced by `replacement` in configuration.
    /// Registering a swapped type is a no-op.
    pub fn swapped_for(mut self, replacement: impl Into<String>) -> Self {
        self.swapped_for = Some(replacement.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn is_swapped(&self) -> bool {
        self.swapped_for.is_some()
    }

    pub fn replacement(&self) -> Option<&str> {
        self.swapped_for.as_deref()
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
