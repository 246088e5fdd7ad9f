//! Loading templates from a YAML template file.
//!
//! A template file is a YAML stream with one template per document:
//!
//! ```yaml
//! url: https://example.com/events
//! selector event: .event
//! selector title: .title
//! ---
//! url: https://example.org/agenda
//! item_selector: li.agenda-item
//! fields:
//!   title: h3
//! ```
//!
//! A single document holding a sequence of templates is accepted as well.
//! Only a stream that is not a sequence of documents fails as a whole; an
//! individual document that is not a template mapping is kept in place as a
//! defective [`RawTemplate`], so it is reported at its position in the batch.

use std::path::Path;

use serde::Deserialize;
use serde_yaml::Value;

use crate::error::AppError;
use crate::template::RawTemplate;

/// Parse every template of a YAML stream, in file order.
pub fn load_templates(content: &str) -> Result<Vec<RawTemplate>, AppError> {
    let mut templates = Vec::new();

    for (position, document) in serde_yaml::Deserializer::from_str(content).enumerate() {
        let value = Value::deserialize(document)
            .map_err(|e| AppError::config(format!("Invalid YAML in document {}: {e}", position + 1)))?;

        match value {
            Value::Null => {}
            Value::Sequence(items) => {
                templates.extend(items.into_iter().map(raw_template));
            }
            Value::Mapping(_) | Value::Tagged(_) => templates.push(raw_template(value)),
            other => {
                return Err(AppError::config(format!(
                    "Document {} is not a template or a list of templates (found {})",
                    position + 1,
                    describe(&other)
                )));
            }
        }
    }

    tracing::debug!(templates = templates.len(), "Loaded templates");
    Ok(templates)
}

/// Read and parse a template file.
pub fn load_templates_from_path(path: &Path) -> Result<Vec<RawTemplate>, AppError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        AppError::config(format!("Failed to read template file {}: {e}", path.display()))
    })?;
    load_templates(&content)
}

fn raw_template(value: Value) -> RawTemplate {
    if !value.is_mapping() {
        return RawTemplate::defective(format!(
            "expected a template mapping, found {}",
            describe(&value)
        ));
    }

    // Read identity up front; a failed deserialization still reports under it.
    let url = identity(&value, "url");
    let name = identity(&value, "name");

    serde_yaml::from_value(value).unwrap_or_else(|e| RawTemplate {
        url,
        name,
        ..RawTemplate::defective(format!("malformed template: {e}"))
    })
}

/// Scalar at `key` of a mapping, rendered as text.
fn identity(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
