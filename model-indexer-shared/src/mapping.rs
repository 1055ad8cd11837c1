//! Index mapping model.
//!
//! Mirrors the backend's native mapping schema closely enough that the
//! repository crate can render it to a request body without extra lookups.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field types understood by the search backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchFieldType {
    Date,
    Boolean,
    Float,
    HalfFloat,
    Double,
    Byte,
    Short,
    Integer,
    Long,
    Ip,
    Text,
    Keyword,
    Object,
    Nested,
    GeoPoint,
    GeoShape,
    Completion,
    Percolator,
    Attachment,
}

impl SearchFieldType {
    /// The type name as it appears in a mapping.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Boolean => "boolean",
            Self::Float => "float",
            Self::HalfFloat => "half_float",
            Self::Double => "double",
            Self::Byte => "byte",
            Self::Short => "short",
            Self::Integer => "integer",
            Self::Long => "long",
            Self::Ip => "ip",
            Self::Text => "text",
            Self::Keyword => "keyword",
            Self::Object => "object",
            Self::Nested => "nested",
            Self::GeoPoint => "geo_point",
            Self::GeoShape => "geo_shape",
            Self::Completion => "completion",
            Self::Percolator => "percolator",
            Self::Attachment => "attachment",
        }
    }
}

impl fmt::Display for SearchFieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named analyzer and its `settings.analysis.analyzer` definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerDefinition {
    /// Analyzer name referenced by field mappings.
    pub name: String,
    /// The analyzer body, e.g. `{"type": "custom", "tokenizer": "standard"}`.
    pub definition: Value,
}

impl AnalyzerDefinition {
    pub fn new(name: impl Into<String>, definition: Value) -> Self {
        Self {
            name: name.into(),
            definition,
        }
    }
}

/// Mapping of a single field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMapping {
    /// Field name in the document.
    pub name: String,
    /// Backend field type.
    pub field_type: SearchFieldType,
    /// Analyzer declared on this field, if any.
    pub analyzer: Option<AnalyzerDefinition>,
    /// Extra mapping parameters merged into the field body (`index`, `format`, ...).
    pub params: serde_json::Map<String, Value>,
    /// Sub-properties for `object` and `nested` fields.
    pub properties: Vec<FieldMapping>,
}

impl FieldMapping {
    pub fn new(name: impl Into<String>, field_type: SearchFieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            analyzer: None,
            params: serde_json::Map::new(),
            properties: Vec::new(),
        }
    }
}

/// Full mapping of one document type.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMapping {
    /// Document type identifier recorded alongside the mapping.
    pub document_type: String,
    /// Fields in declaration order.
    pub fields: Vec<FieldMapping>,
}

impl IndexMapping {
    pub fn new(document_type: impl Into<String>, fields: Vec<FieldMapping>) -> Self {
        Self {
            document_type: document_type.into(),
            fields,
        }
    }

    /// Analyzers declared by any field, nested ones included, first declaration wins.
    pub fn analyzers(&self) -> Vec<&AnalyzerDefinition> {
        fn collect<'a>(fields: &'a [FieldMapping], out: &mut Vec<&'a AnalyzerDefinition>) {
            for field in fields {
                if let Some(analyzer) = &field.analyzer {
                    if !out.iter().any(|a| a.name == analyzer.name) {
                        out.push(analyzer);
                    }
                }
                collect(&field.properties, out);
            }
        }

        let mut analyzers = Vec::new();
        collect(&self.fields, &mut analyzers);
        analyzers
    }
}
