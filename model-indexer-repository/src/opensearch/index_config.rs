//! Index creation bodies and mapping compatibility checks.
//!
//! This module renders an `IndexMapping` into the backend's native
//! `{mappings, settings.analysis}` body and compares a desired mapping
//! against the one an existing index already carries.

use serde_json::{json, Map, Value};

use model_indexer_shared::{FieldMapping, IndexMapping};

/// Render the `properties` object for a list of fields.
pub fn mapping_properties(fields: &[FieldMapping]) -> Value {
    let mut properties = Map::new();
    for field in fields {
        properties.insert(field.name.clone(), field_body(field));
    }
    Value::Object(properties)
}

fn field_body(field: &FieldMapping) -> Value {
    let mut body = Map::new();
    body.insert("type".to_string(), json!(field.field_type.as_str()));

    if let Some(analyzer) = &field.analyzer {
        body.insert("analyzer".to_string(), json!(analyzer.name));
    }

    for (key, value) in &field.params {
        body.insert(key.clone(), value.clone());
    }

    if !field.properties.is_empty() {
        body.insert(
            "properties".to_string(),
            mapping_properties(&field.properties),
        );
    }

    Value::Object(body)
}

/// Build the full index creation body.
///
/// The document type is recorded under `mappings._meta.document_type`.
pub fn build_index_body(mapping: &IndexMapping) -> Value {
    let mut analyzers = Map::new();
    for analyzer in mapping.analyzers() {
        analyzers.insert(analyzer.name.clone(), analyzer.definition.clone());
    }

    let mut analysis = Map::new();
    if !analyzers.is_empty() {
        analysis.insert("analyzer".to_string(), Value::Object(analyzers));
    }

    json!({
        "settings": {
            "analysis": Value::Object(analysis)
        },
        "mappings": {
            "_meta": {
                "document_type": mapping.document_type
            },
            "properties": mapping_properties(&mapping.fields)
        }
    })
}

/// List every way `existing_properties` disagrees with `desired`.
///
/// A field missing from the existing mapping, or present with another type,
/// is a conflict. Fields only present in the existing mapping are ignored.
/// An empty result means the existing index can be written to as is.
pub fn mapping_conflicts(existing_properties: &Value, desired: &[FieldMapping]) -> Vec<String> {
    let mut conflicts = Vec::new();
    collect_conflicts("", existing_properties, desired, &mut conflicts);
    conflicts
}

fn collect_conflicts(prefix: &str, existing: &Value, desired: &[FieldMapping], out: &mut Vec<String>) {
    for field in desired {
        let path = format!("{}{}", prefix, field.name);
        let Some(current) = existing.get(&field.name) else {
            out.push(format!("field `{}` is missing from the existing mapping", path));
            continue;
        };

        // Inner objects may omit `type` and only carry `properties`.
        let current_type = current
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or(if current.get("properties").is_some() {
                "object"
            } else {
                "unknown"
            });

        if current_type != field.field_type.as_str() {
            out.push(format!(
                "field `{}` is mapped as `{}`, wanted `{}`",
                path, current_type, field.field_type
            ));
            continue;
        }

        if !field.properties.is_empty() {
            let empty = json!({});
            let inner = current.get("properties").unwrap_or(&empty);
            collect_conflicts(&format!("{}.", path), inner, &field.properties, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_indexer_shared::{AnalyzerDefinition, SearchFieldType};

    fn book_mapping() -> IndexMapping {
        let mut title = FieldMapping::new("title", SearchFieldType::Text);
        title.analyzer = Some(AnalyzerDefinition::new(
            "folding",
            json!({"type": "custom", "tokenizer": "standard", "filter": ["lowercase", "asciifolding"]}),
        ));

        let mut isbn = FieldMapping::new("isbn", SearchFieldType::Keyword);
        isbn.params.insert("index".to_string(), json!(false));

        let mut author = FieldMapping::new("author", SearchFieldType::Object);
        author
            .properties
            .push(FieldMapping::new("name", SearchFieldType::Text));

        IndexMapping::new(
            "book",
            vec![
                title,
                isbn,
                author,
                FieldMapping::new("published", SearchFieldType::Date),
            ],
        )
    }

    #[test]
    fn test_index_body_structure() {
        let body = build_index_body(&book_mapping());

        assert_eq!(body["mappings"]["_meta"]["document_type"], "book");

        let properties = &body["mappings"]["properties"];
        assert_eq!(properties["title"]["type"], "text");
        assert_eq!(properties["title"]["analyzer"], "folding");
        assert_eq!(properties["isbn"]["type"], "keyword");
        assert_eq!(properties["isbn"]["index"], false);
        assert_eq!(properties["author"]["properties"]["name"]["type"], "text");
        assert_eq!(properties["published"]["type"], "date");

        assert_eq!(
            body["settings"]["analysis"]["analyzer"]["folding"]["tokenizer"],
            "standard"
        );
    }

    #[test]
    fn test_index_body_without_analyzers() {
        let mapping = IndexMapping::new(
            "tag",
            vec![FieldMapping::new("label", SearchFieldType::Keyword)],
        );
        let body = build_index_body(&mapping);

        assert_eq!(body["settings"]["analysis"], json!({}));
    }

    #[test]
    fn test_identical_mapping_has_no_conflicts() {
        let mapping = book_mapping();
        let existing = mapping_properties(&mapping.fields);

        assert!(mapping_conflicts(&existing, &mapping.fields).is_empty());
    }

    #[test]
    fn test_changed_type_conflicts() {
        let existing = json!({
            "title": {"type": "keyword"},
            "isbn": {"type": "keyword"},
            "author": {"properties": {"name": {"type": "text"}}},
            "published": {"type": "date"}
        });

        let conflicts = mapping_conflicts(&existing, &book_mapping().fields);

        assert_eq!(conflicts.len(), 1);
        assert!(conflicts[0].contains("`title`"));
        assert!(conflicts[0].contains("`keyword`"));
    }

    #[test]
    fn test_missing_nested_field_conflicts() {
        let existing = json!({
            "title": {"type": "text"},
            "isbn": {"type": "keyword"},
            "author": {"type": "object", "properties": {}},
            "published": {"type": "date"},
            "legacy": {"type": "long"}
        });

        let conflicts = mapping_conflicts(&existing, &book_mapping().fields);

        assert_eq!(conflicts, vec!["field `author.name` is missing from the existing mapping"]);
    }
}
