//! Indexed field declarations.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::record::Record;
use model_indexer_shared::{AnalyzerDefinition, FieldMapping, SearchFieldType};

/// A registered function computing a value from a record.
///
/// Used both for computed fields and for per-field prepare overrides.
pub type FieldFn = Arc<dyn Fn(&dyn Record) -> Result<Value, String> + Send + Sync>;

/// How a field gets its value, in resolution order.
pub enum ExtractionRule<'a> {
    /// Render the named template with the record bound as `object`.
    Template(&'a str),
    /// Call a registered function.
    Computed(&'a FieldFn),
    /// Read an attribute off the record.
    Attribute(&'a str),
}

/// One indexed field: its name, search type and extraction rule.
///
/// Exactly one rule is expected. When several are set, the template wins over
/// the computed function, which wins over the attribute.
#[derive(Clone)]
pub struct FieldSpec {
    name: String,
    search_type: SearchFieldType,
    template: Option<String>,
    computed: Option<FieldFn>,
    attribute: Option<String>,
    analyzer: Option<AnalyzerDefinition>,
    params: Map<String, Value>,
    properties: Vec<FieldMapping>,
}

impl FieldSpec {
    /// Declare a field without an extraction rule.
    ///
    /// The descriptor only accepts it if a prepare override exists for it.
    pub fn new(name: impl Into<String>, search_type: SearchFieldType) -> Self {
        Self {
            name: name.into(),
            search_type,
            template: None,
            computed: None,
            attribute: None,
            analyzer: None,
            params: Map::new(),
            properties: Vec::new(),
        }
    }

    /// Declare a field read from the attribute of the same name.
    pub fn attribute(name: impl Into<String>, search_type: SearchFieldType) -> Self {
        let name = name.into();
        Self::new(name.clone(), search_type).from_attribute(name)
    }

    /// Read the value from `attribute`.
    pub fn from_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Compute the value with `f`.
    pub fn computed<F>(mut self, f: F) -> Self
    where
        F: Fn(&dyn Record) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.computed = Some(Arc::new(f));
        self
    }

    /// Render the value from the named template.
    pub fn template(mut self, template_name: impl Into<String>) -> Self {
        self.template = Some(template_name.into());
        self
    }

    /// Analyze the field with `analyzer`, declared in the index settings.
    pub fn analyzer(mut self, analyzer: AnalyzerDefinition) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    /// Add a raw mapping parameter, e.g. `("index", false)`.
    pub fn param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Add a sub-property to an `object` or `nested` field.
    pub fn property(mut self, property: FieldMapping) -> Self {
        self.properties.push(property);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn search_type(&self) -> SearchFieldType {
        self.search_type
    }

    /// The attribute this field reads, if it is an attribute field.
    pub fn source_attribute(&self) -> Option<&str> {
        self.attribute.as_deref()
    }

    /// The rule used to extract the value, by fixed priority.
    pub fn rule(&self) -> Option<ExtractionRule<'_>> {
        if let Some(template) = &self.template {
            return Some(ExtractionRule::Template(template));
        }
        if let Some(computed) = &self.computed {
            return Some(ExtractionRule::Computed(computed));
        }
        self.attribute.as_deref().map(ExtractionRule::Attribute)
    }

    /// The backend mapping for this field.
    pub fn mapping(&self) -> FieldMapping {
        FieldMapping {
            name: self.name.clone(),
            field_type: self.search_type,
            analyzer: self.analyzer.clone(),
            params: self.params.clone(),
            properties: self.properties.clone(),
        }
    }

    pub(crate) fn merge_params(&mut self, params: &Map<String, Value>) {
        for (key, value) in params {
            self.params.insert(key.clone(), value.clone());
        }
    }
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("search_type", &self.search_type)
            .field("template", &self.template)
            .field("computed", &self.computed.is_some())
            .field("attribute", &self.attribute)
            .field("analyzer", &self.analyzer.as_ref().map(|a| &a.name))
            .finish()
    }
}
