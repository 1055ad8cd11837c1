//! Template rendering for template-backed fields.
//!
//! A template is rendered with the record bound as `object`. The built-in
//! [`TemplateRegistry`] understands `{{ object.<attribute> }}` placeholders;
//! hosts with a full template engine implement [`TemplateRenderer`] instead.

use std::collections::HashMap;

use serde_json::Value;

use crate::errors::PipelineError;
use crate::record::Record;

/// Renders a named template against a record.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, name: &str, record: &dyn Record) -> Result<String, PipelineError>;
}

const OPEN: &str = "{{";
const CLOSE: &str = "}}";
const BINDING: &str = "object.";

/// Named templates with attribute placeholders.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, String>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a template.
    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.templates.insert(name.into(), source.into());
    }

    pub fn with_template(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }
}

fn placeholder_value(expression: &str, record: &dyn Record) -> Result<String, PipelineError> {
    let attribute = expression.strip_prefix(BINDING).ok_or_else(|| {
        PipelineError::template(format!("Unsupported placeholder {{{{ {} }}}}", expression))
    })?;

    Ok(match record.attribute(attribute) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    })
}

impl TemplateRenderer for TemplateRegistry {
    fn render(&self, name: &str, record: &dyn Record) -> Result<String, PipelineError> {
        let source = self
            .templates
            .get(name)
            .ok_or_else(|| PipelineError::template(format!("Unknown template {}", name)))?;

        let mut output = String::with_capacity(source.len());
        let mut rest = source.as_str();
        while let Some(start) = rest.find(OPEN) {
            output.push_str(&rest[..start]);
            let after_open = &rest[start + OPEN.len()..];
            let end = after_open.find(CLOSE).ok_or_else(|| {
                PipelineError::template(format!("Unterminated placeholder in template {}", name))
            })?;
            output.push_str(&placeholder_value(after_open[..end].trim(), record)?);
            rest = &after_open[end + CLOSE.len()..];
        }
        output.push_str(rest);

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn record() -> Map<String, Value> {
        json!({"title": "Dune", "pages": 412, "subtitle": null})
            .as_object()
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_render_placeholders() {
        let templates = TemplateRegistry::new()
            .with_template("card", "{{ object.title }} ({{object.pages}} pages){{ object.subtitle }}");

        assert_eq!(templates.render("card", &record()).unwrap(), "Dune (412 pages)");
    }

    #[test]
    fn test_missing_attribute_renders_empty() {
        let templates = TemplateRegistry::new().with_template("t", "[{{ object.isbn }}]");

        assert_eq!(templates.render("t", &record()).unwrap(), "[]");
    }

    #[test]
    fn test_template_errors() {
        let templates = TemplateRegistry::new()
            .with_template("open", "{{ object.title")
            .with_template("foreign", "{{ user.name }}");

        assert!(matches!(
            templates.render("open", &record()),
            Err(PipelineError::TemplateError(_))
        ));
        assert!(matches!(
            templates.render("foreign", &record()),
            Err(PipelineError::TemplateError(_))
        ));
        assert!(matches!(
            templates.render("nope", &record()),
            Err(PipelineError::TemplateError(_))
        ));
    }
}
