// src/schema/builder.rs
//! Field descriptors → named record definition.

use std::collections::HashSet;

use super::{FieldDescriptor, SchemaDescriptor};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("schema '{0}' has no fields")]
    Empty(String),
}

/// Assemble fields into a record definition where every field is required.
///
/// Duplicate names (possible after the mapper trims whitespace) keep their
/// first occurrence. Fails only when no fields remain.
pub fn build_schema(
    name: &str,
    fields: Vec<FieldDescriptor>,
) -> Result<SchemaDescriptor, SchemaError> {
    let mut seen = HashSet::new();
    let fields: Vec<FieldDescriptor> = fields
        .into_iter()
        .filter(|f| seen.insert(f.name.clone()))
        .collect();

    if fields.is_empty() {
        return Err(SchemaError::Empty(name.to_string()));
    }
    Ok(SchemaDescriptor::from_parts(name.to_string(), fields))
}
