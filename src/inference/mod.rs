// src/inference/mod.rs
//! Instruction → SchemaDescriptor.
//!
//! One LLM call per instruction. Transport and auth failures of that call
//! are returned to the caller; only shape problems in an otherwise
//! successful completion are absorbed by falling back to a fixed schema.

pub mod parser;

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::llm::{LlmClient, LlmError};
use crate::schema::{build_schema, map_properties, FieldDescriptor, FieldKind, SchemaDescriptor};

pub use parser::{parse_schema_response, ParseSource, ParsedSchema};

pub const INFERRED_SCHEMA_NAME: &str = "InferredSchema";
pub const DEFAULT_SCHEMA_NAME: &str = "PageSummary";

const SCHEMA_PROMPT_TEMPLATE: &str = "\
You design JSON Schemas for structured web data extraction.

Write a JSON Schema describing ONE record of the data requested by the instruction below.
Rules:
- The top level must be an object with a \"properties\" map.
- Every property has a \"type\" (one of: string, integer, number, boolean, array, object) and a short \"description\".
- Use concise snake_case property names.
- Reply with the JSON Schema inside a ```json code block and nothing else.

Instruction:
{instruction}";

/// Render the fixed schema-generation prompt for an instruction.
pub fn schema_prompt(instruction: &str) -> String {
    SCHEMA_PROMPT_TEMPLATE.replace("{instruction}", instruction.trim())
}

/// Generic "page summary" schema used when the completion yields no fields.
pub fn default_schema() -> SchemaDescriptor {
    let fields = vec![
        FieldDescriptor {
            name: "topic".into(),
            kind: FieldKind::String,
            description: "Main topic of the page".into(),
        },
        FieldDescriptor {
            name: "keywords".into(),
            kind: FieldKind::Array,
            description: "Keywords describing the page content".into(),
        },
        FieldDescriptor {
            name: "summary".into(),
            kind: FieldKind::String,
            description: "Short summary of the page".into(),
        },
    ];
    SchemaDescriptor::from_parts(DEFAULT_SCHEMA_NAME.to_string(), fields)
}

/// The `properties` map of a parsed schema object.
///
/// A top-level `{"type": "array", "items": {...}}` is unwrapped to its item
/// schema, since "a list of X" is how most instructions read.
fn properties_of(schema: &Map<String, Value>) -> Option<&Map<String, Value>> {
    if let Some(props) = schema.get("properties").and_then(Value::as_object) {
        return Some(props);
    }
    schema
        .get("items")
        .and_then(Value::as_object)
        .and_then(|items| items.get("properties"))
        .and_then(Value::as_object)
}

/// Convert a parsed schema object into a descriptor, or `None` when it has no usable fields.
pub fn descriptor_from_object(schema: &Map<String, Value>) -> Option<SchemaDescriptor> {
    let props = properties_of(schema)?;
    build_schema(INFERRED_SCHEMA_NAME, map_properties(props)).ok()
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct SchemaInference {
    llm: Arc<dyn LlmClient>,
}

impl SchemaInference {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Ask the LLM for a schema matching `instruction`.
    pub async fn infer(&self, instruction: &str) -> Result<SchemaDescriptor, LlmError> {
        let raw = self.llm.complete(&schema_prompt(instruction)).await?;
        let parsed = parse_schema_response(&raw);

        match descriptor_from_object(&parsed.object) {
            Some(schema) => {
                tracing::info!(
                    source = parsed.source.as_str(),
                    fields = schema.fields().len(),
                    "schema inference: built schema from completion"
                );
                Ok(schema)
            }
            None => {
                tracing::warn!(
                    source = parsed.source.as_str(),
                    "schema inference: completion has no usable properties, using default schema"
                );
                Ok(default_schema())
            }
        }
    }
}
