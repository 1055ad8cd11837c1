//! Builder producing an [`IndexDescriptor`].

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::info;

use super::field::{FieldFn, FieldSpec};
use super::naming::IndexNamePolicy;
use super::{IndexDescriptor, Predicate};
use crate::errors::PipelineError;
use crate::record::{Record, RecordType};
use crate::schema::SchemaResolver;

/// Default name of the attribute holding a record's identifier.
pub const DEFAULT_ID_FIELD: &str = "pk";

/// Collects the indexing configuration of one record type.
///
/// Fields come from two places: columns reported by a [`SchemaResolver`]
/// (filtered by the include and exclude lists) and fields declared with
/// [`field`](Self::field). Declared fields take precedence.
#[derive(Default)]
pub struct IndexDescriptorBuilder {
    index_policy: Option<IndexNamePolicy>,
    document_type: Option<String>,
    id_field: Option<String>,
    fields: Vec<FieldSpec>,
    overrides: HashMap<String, FieldFn>,
    additional_fields: Vec<String>,
    predicate: Option<Predicate>,
    schema: Option<Arc<dyn SchemaResolver>>,
    include: Vec<String>,
    exclude: Vec<String>,
    hotfixes: HashMap<String, Map<String, Value>>,
}

impl IndexDescriptorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write to a fixed index.
    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.index_policy = Some(IndexNamePolicy::fixed(name));
        self
    }

    pub fn index_policy(mut self, policy: IndexNamePolicy) -> Self {
        self.index_policy = Some(policy);
        self
    }

    pub fn document_type(mut self, document_type: impl Into<String>) -> Self {
        self.document_type = Some(document_type.into());
        self
    }

    /// Attribute used as the document id.
    pub fn id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = Some(id_field.into());
        self
    }

    /// Declare an indexed field.
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Replace the extraction of `field` with `f`.
    pub fn prepare<F>(mut self, field: impl Into<String>, f: F) -> Self
    where
        F: Fn(&dyn Record) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.overrides.insert(field.into(), Arc::new(f));
        self
    }

    /// Attributes to fetch by id even though they are not indexed directly.
    pub fn additional_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.additional_fields
            .extend(fields.into_iter().map(Into::into));
        self
    }

    /// Only index records for which `f` returns true.
    pub fn matches<F>(mut self, f: F) -> Self
    where
        F: Fn(&dyn Record) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(f));
        self
    }

    /// Derive attribute fields from the record type's columns.
    pub fn schema(mut self, resolver: Arc<dyn SchemaResolver>) -> Self {
        self.schema = Some(resolver);
        self
    }

    /// Restrict schema-derived fields to these columns.
    pub fn include_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Skip these columns when deriving fields.
    pub fn exclude_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Merge extra mapping parameters into a schema-derived field.
    pub fn hotfix(mut self, field: impl Into<String>, params: Map<String, Value>) -> Self {
        self.hotfixes.insert(field.into(), params);
        self
    }

    fn derived_fields(&self, record_type: &RecordType) -> Vec<FieldSpec> {
        let Some(schema) = &self.schema else {
            return Vec::new();
        };

        schema
            .columns(record_type)
            .into_iter()
            .filter(|column| !column.is_relation)
            .filter(|column| self.include.is_empty() || self.include.contains(&column.name))
            .filter(|column| !self.exclude.contains(&column.name))
            .map(|column| {
                let mut spec = FieldSpec::attribute(&column.name, column.column_type.search_type());
                if let Some(params) = self.hotfixes.get(&column.name) {
                    spec.merge_params(params);
                }
                spec
            })
            .collect()
    }

    /// Validate the configuration and produce the descriptor.
    pub fn build(self, record_type: &RecordType) -> Result<IndexDescriptor, PipelineError> {
        let mut fields = self.derived_fields(record_type);
        let mut fields_to_fetch: Vec<String> = fields.iter().map(|f| f.name().to_string()).collect();

        for declared in &self.fields {
            if let Some(position) = fields.iter().position(|f| f.name() == declared.name()) {
                info!(
                    record_type = %record_type,
                    field = declared.name(),
                    "Overwriting implicitly defined field with its explicit declaration"
                );
                fields[position] = declared.clone();
                continue;
            }
            if let Some(attribute) = declared.source_attribute() {
                fields.retain(|f| f.name() != attribute);
            }
            fields.push(declared.clone());
        }

        for spec in &fields {
            if spec.rule().is_none() && !self.overrides.contains_key(spec.name()) {
                return Err(PipelineError::configuration(format!(
                    "Field {} of {} has no extraction rule",
                    spec.name(),
                    record_type
                )));
            }
        }
        for name in self.overrides.keys() {
            if !fields.iter().any(|f| f.name() == name) {
                return Err(PipelineError::configuration(format!(
                    "Prepare override for unknown field {} of {}",
                    name, record_type
                )));
            }
        }

        let id_field = self.id_field.unwrap_or_else(|| DEFAULT_ID_FIELD.to_string());
        let wanted = fields
            .iter()
            .flat_map(|f| [Some(f.name()), f.source_attribute()])
            .flatten()
            .chain(self.additional_fields.iter().map(String::as_str))
            .chain(std::iter::once(id_field.as_str()));
        for name in wanted {
            if !fields_to_fetch.iter().any(|f| f == name) {
                fields_to_fetch.push(name.to_string());
            }
        }

        let document_type = self
            .document_type
            .unwrap_or_else(|| record_type.name().to_lowercase());
        let index_policy = self
            .index_policy
            .unwrap_or_else(|| IndexNamePolicy::for_document_type(&document_type));
        let predicate: Predicate = match self.predicate {
            Some(predicate) => predicate,
            None => Arc::new(|_: &dyn Record| true),
        };

        Ok(IndexDescriptor {
            record_type: record_type.clone(),
            document_type,
            id_field,
            index_names: vec![index_policy.resolve()],
            index_policy,
            fields,
            overrides: self.overrides,
            fields_to_fetch,
            predicate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, ColumnType};
    use model_indexer_shared::SearchFieldType;
    use serde_json::json;

    struct BookSchema;

    impl SchemaResolver for BookSchema {
        fn columns(&self, _record_type: &RecordType) -> Vec<Column> {
            vec![
                Column::new("id", ColumnType::Auto),
                Column::new("title", ColumnType::Char),
                Column::new("published", ColumnType::Date),
                Column::new("price", ColumnType::Decimal),
                Column::relation("author"),
            ]
        }
    }

    fn books() -> RecordType {
        RecordType::new("Book")
    }

    fn names(descriptor: &IndexDescriptor) -> Vec<&str> {
        descriptor.fields().iter().map(FieldSpec::name).collect()
    }

    #[test]
    fn test_defaults() {
        let descriptor = IndexDescriptorBuilder::new()
            .field(FieldSpec::attribute("title", SearchFieldType::Text))
            .build(&books())
            .unwrap();

        assert_eq!(descriptor.document_type(), "book");
        assert_eq!(descriptor.id_field(), "pk");
        assert_eq!(descriptor.index_names(), ["model_index-book".to_string()]);
    }

    #[test]
    fn test_schema_fields_skip_relations_and_excludes() {
        let descriptor = IndexDescriptorBuilder::new()
            .schema(Arc::new(BookSchema))
            .exclude_fields(["price"])
            .build(&books())
            .unwrap();

        assert_eq!(names(&descriptor), vec!["id", "title", "published"]);
        assert_eq!(descriptor.fields()[2].search_type(), SearchFieldType::Date);
    }

    #[test]
    fn test_include_list_and_hotfix() {
        let mut params = Map::new();
        params.insert("index".to_string(), json!(false));

        let descriptor = IndexDescriptorBuilder::new()
            .schema(Arc::new(BookSchema))
            .include_fields(["title", "price", "author"])
            .hotfix("price", params)
            .build(&books())
            .unwrap();

        assert_eq!(names(&descriptor), vec!["title", "price"]);
        assert_eq!(descriptor.fields()[1].mapping().params["index"], json!(false));
    }

    #[test]
    fn test_declared_field_replaces_derived() {
        let descriptor = IndexDescriptorBuilder::new()
            .schema(Arc::new(BookSchema))
            .field(FieldSpec::attribute("title", SearchFieldType::Keyword))
            .field(FieldSpec::new("cost", SearchFieldType::Double).from_attribute("price"))
            .build(&books())
            .unwrap();

        assert_eq!(names(&descriptor), vec!["id", "title", "published", "cost"]);
        assert_eq!(descriptor.fields()[1].search_type(), SearchFieldType::Keyword);
        assert!(descriptor.fields_to_fetch().contains(&"price".to_string()));
    }

    #[test]
    fn test_field_without_rule_is_rejected() {
        let result = IndexDescriptorBuilder::new()
            .field(FieldSpec::new("summary", SearchFieldType::Text))
            .build(&books());

        assert!(matches!(result, Err(PipelineError::ConfigurationError(_))));
    }

    #[test]
    fn test_override_satisfies_missing_rule() {
        let descriptor = IndexDescriptorBuilder::new()
            .field(FieldSpec::new("summary", SearchFieldType::Text))
            .prepare("summary", |_| Ok(json!("short")))
            .build(&books())
            .unwrap();

        assert!(descriptor.override_for("summary").is_some());
    }

    #[test]
    fn test_override_for_unknown_field_is_rejected() {
        let result = IndexDescriptorBuilder::new()
            .field(FieldSpec::attribute("title", SearchFieldType::Text))
            .prepare("summary", |_| Ok(json!("short")))
            .build(&books());

        assert!(matches!(result, Err(PipelineError::ConfigurationError(_))));
    }

    #[test]
    fn test_fields_to_fetch() {
        let descriptor = IndexDescriptorBuilder::new()
            .id_field("isbn")
            .field(FieldSpec::attribute("title", SearchFieldType::Text))
            .additional_fields(["subtitle", "title"])
            .build(&books())
            .unwrap();

        assert_eq!(
            descriptor.fields_to_fetch(),
            ["title", "subtitle", "isbn"].map(String::from)
        );
    }
}
