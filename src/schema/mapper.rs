// src/schema/mapper.rs
//! JSON Schema `properties` → field descriptors.

use serde_json::{Map, Value};

use super::{FieldDescriptor, FieldKind};

/// Convert a JSON Schema `properties` map into ordered field descriptors.
///
/// Pure and total: a property that is not an object, lacks `type`, or names
/// an unknown type becomes a `String` field. Missing descriptions become
/// empty strings. Blank names are skipped.
pub fn map_properties(properties: &Map<String, Value>) -> Vec<FieldDescriptor> {
    properties
        .iter()
        .filter_map(|(name, prop)| {
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            let declared = prop.get("type").and_then(declared_type);
            let description = prop
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Some(FieldDescriptor {
                name: name.to_string(),
                kind: FieldKind::from_json_type(declared),
                description,
            })
        })
        .collect()
}

// `"type": ["string", "null"]` is common in LLM output; take the first non-null entry.
fn declared_type(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s.as_str()),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null"),
        _ => None,
    }
}
