//! Index descriptors.
//!
//! A descriptor is the registered indexing configuration of one record type:
//! the ordered field set, the index naming policy with its name history, the
//! document type, the id field and the qualifying predicate.

mod builder;
mod field;
mod naming;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub use builder::{IndexDescriptorBuilder, DEFAULT_ID_FIELD};
pub use field::{ExtractionRule, FieldFn, FieldSpec};
pub use naming::{IndexNamePolicy, DEFAULT_INDEX_PREFIX};

use crate::record::{Record, RecordType};
use model_indexer_shared::{DocumentId, IndexMapping};

/// Decides whether a record belongs in the index.
pub type Predicate = Arc<dyn Fn(&dyn Record) -> bool + Send + Sync>;

/// Indexing configuration of one record type.
pub struct IndexDescriptor {
    record_type: RecordType,
    document_type: String,
    id_field: String,
    index_policy: IndexNamePolicy,
    index_names: Vec<String>,
    fields: Vec<FieldSpec>,
    overrides: HashMap<String, FieldFn>,
    fields_to_fetch: Vec<String>,
    predicate: Predicate,
}

impl IndexDescriptor {
    pub fn builder() -> IndexDescriptorBuilder {
        IndexDescriptorBuilder::new()
    }

    pub fn record_type(&self) -> &RecordType {
        &self.record_type
    }

    pub fn document_type(&self) -> &str {
        &self.document_type
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Every index name this descriptor has targeted, oldest first.
    pub fn index_names(&self) -> &[String] {
        &self.index_names
    }

    /// The most recently targeted index.
    pub fn index_name(&self) -> &str {
        self.index_names
            .last()
            .map(String::as_str)
            .unwrap_or(DEFAULT_INDEX_PREFIX)
    }

    /// The index name the naming policy currently asks for.
    ///
    /// May differ between calls for dynamic policies.
    pub fn populate_index(&self) -> String {
        self.index_policy.resolve()
    }

    /// Indexed fields in declaration order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn override_for(&self, field: &str) -> Option<&FieldFn> {
        self.overrides.get(field)
    }

    /// Attributes to request when fetching a record by id.
    pub fn fields_to_fetch(&self) -> &[String] {
        &self.fields_to_fetch
    }

    /// Whether `record` qualifies for indexing.
    pub fn matches(&self, record: &dyn Record) -> bool {
        (self.predicate)(record)
    }

    /// The backend mapping of this descriptor's fields.
    pub fn mapping(&self) -> IndexMapping {
        IndexMapping::new(
            self.document_type.clone(),
            self.fields.iter().map(FieldSpec::mapping).collect(),
        )
    }

    /// The document id of `record`, if its id attribute is set.
    pub fn record_id(&self, record: &dyn Record) -> Option<DocumentId> {
        record
            .attribute(&self.id_field)
            .and_then(|value| DocumentId::from_value(&value))
    }

    /// Append `name` to the history unless it is already there.
    ///
    /// Returns true when the name is new.
    pub(crate) fn push_index_name(&mut self, name: &str) -> bool {
        if self.index_names.iter().any(|known| known == name) {
            return false;
        }
        self.index_names.push(name.to_string());
        true
    }
}

impl fmt::Debug for IndexDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexDescriptor")
            .field("record_type", &self.record_type)
            .field("document_type", &self.document_type)
            .field("id_field", &self.id_field)
            .field("index_names", &self.index_names)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}
