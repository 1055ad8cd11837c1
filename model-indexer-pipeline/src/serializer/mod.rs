//! Document serializer.
//!
//! Turns one record into the document stored in the search index, walking the
//! descriptor's fields in declaration order.

use std::sync::Arc;

use serde_json::Value;
use tracing::instrument;

use crate::descriptor::{ExtractionRule, FieldSpec, IndexDescriptor};
use crate::errors::PipelineError;
use crate::record::{Record, RecordStore};
use crate::template::TemplateRenderer;
use model_indexer_shared::{Document, DocumentId};

/// What to serialize: a live record, or the id of one to fetch.
#[derive(Clone, Copy)]
pub enum SerializeTarget<'a> {
    Record(&'a dyn Record),
    Id(&'a DocumentId),
}

/// Converts records into documents.
#[derive(Clone)]
pub struct DocumentSerializer {
    store: Arc<dyn RecordStore>,
    templates: Arc<dyn TemplateRenderer>,
}

impl DocumentSerializer {
    pub fn new(store: Arc<dyn RecordStore>, templates: Arc<dyn TemplateRenderer>) -> Self {
        Self { store, templates }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Serialize a record, fetching it first when given an id.
    ///
    /// Fails with `RecordNotFound` when the id matches no row and with
    /// `FieldExtraction` when a field's rule fails.
    pub async fn serialize(
        &self,
        descriptor: &IndexDescriptor,
        target: SerializeTarget<'_>,
    ) -> Result<Document, PipelineError> {
        match target {
            SerializeTarget::Record(record) => self.serialize_record(descriptor, record),
            SerializeTarget::Id(id) => {
                let record = self.load(descriptor, id).await?;
                self.serialize_record(descriptor, record.as_ref())
            }
        }
    }

    /// Fetch a record by id, projected to the descriptor's fields.
    #[instrument(skip(self, descriptor), fields(record_type = %descriptor.record_type()))]
    pub async fn load(
        &self,
        descriptor: &IndexDescriptor,
        id: &DocumentId,
    ) -> Result<Arc<dyn Record>, PipelineError> {
        self.store
            .fetch(descriptor.record_type(), id, descriptor.fields_to_fetch())
            .await?
            .ok_or_else(|| {
                PipelineError::record_not_found(descriptor.record_type().name(), id.as_str())
            })
    }

    /// Serialize a record already in hand.
    pub fn serialize_record(
        &self,
        descriptor: &IndexDescriptor,
        record: &dyn Record,
    ) -> Result<Document, PipelineError> {
        let mut document = Document::new();
        for field in descriptor.fields() {
            let value = match descriptor.override_for(field.name()) {
                Some(prepare) => prepare(record)
                    .map_err(|reason| PipelineError::field_extraction(field.name(), reason))?,
                None => self.extract(field, record)?,
            };
            document.insert(field.name().to_string(), value);
        }
        Ok(document)
    }

    fn extract(&self, field: &FieldSpec, record: &dyn Record) -> Result<Value, PipelineError> {
        match field.rule() {
            Some(ExtractionRule::Template(name)) => self
                .templates
                .render(name, record)
                .map(Value::String)
                .map_err(|e| PipelineError::field_extraction(field.name(), e.to_string())),
            Some(ExtractionRule::Computed(f)) => {
                f(record).map_err(|reason| PipelineError::field_extraction(field.name(), reason))
            }
            // A stored null indexes as null; an absent attribute is an error.
            Some(ExtractionRule::Attribute(attribute)) => {
                record.attribute(attribute).ok_or_else(|| {
                    PipelineError::field_extraction(
                        field.name(),
                        format!("record has no attribute {}", attribute),
                    )
                })
            }
            None => Err(PipelineError::field_extraction(
                field.name(),
                "no extraction rule",
            )),
        }
    }
}
