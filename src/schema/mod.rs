// src/schema/mod.rs
//! Runtime record schemas.
//!
//! A [`SchemaDescriptor`] is the in-memory shape of a record whose fields are
//! only known at request time (typically inferred by the LLM). It serializes
//! to a JSON Schema document for the extraction prompt and doubles as a
//! generic validator for the records the LLM sends back.

pub mod builder;
pub mod mapper;

pub use builder::build_schema;
pub use mapper::map_properties;

use serde_json::{json, Map, Value};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Primitive kind of a field. Unrecognized JSON types degrade to `String`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Float,
    Boolean,
    Array,
    Object,
}

impl FieldKind {
    /// Map a JSON Schema `type` string to a kind. Total: anything unknown is `String`.
    pub fn from_json_type(declared: Option<&str>) -> Self {
        match declared.map(str::trim) {
            Some("string") => FieldKind::String,
            Some("integer") => FieldKind::Integer,
            Some("number") => FieldKind::Float,
            Some("boolean") => FieldKind::Boolean,
            Some("array") => FieldKind::Array,
            Some("object") => FieldKind::Object,
            _ => FieldKind::String,
        }
    }

    /// The JSON Schema `type` keyword for this kind.
    pub fn json_type(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Integer => "integer",
            FieldKind::Float => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Array => "array",
            FieldKind::Object => "object",
        }
    }

    /// Whether a JSON value is an instance of this kind.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            FieldKind::Float => value.is_number(),
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::Array => value.is_array(),
            FieldKind::Object => value.is_object(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    pub description: String,
}

/// Named record definition. Every field is required; names are unique.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDescriptor {
    name: String,
    fields: Vec<FieldDescriptor>,
}

/// A single validation problem found in a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    NotAnObject,
    MissingField(String),
    WrongKind { field: String, expected: &'static str },
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationIssue::NotAnObject => write!(f, "record is not a JSON object"),
            ValidationIssue::MissingField(name) => write!(f, "missing required field '{}'", name),
            ValidationIssue::WrongKind { field, expected } => {
                write!(f, "field '{}' is not of type {}", field, expected)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SchemaDescriptor
// ---------------------------------------------------------------------------

impl SchemaDescriptor {
    /// Caller guarantees non-empty, unique field names; see [`build_schema`].
    pub(crate) fn from_parts(name: String, fields: Vec<FieldDescriptor>) -> Self {
        Self { name, fields }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Every field is required, so this is simply all field names in order.
    pub fn required(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Serialize as a JSON Schema object document.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let mut prop = Map::new();
            prop.insert("type".into(), json!(field.kind.json_type()));
            if !field.description.is_empty() {
                prop.insert("description".into(), json!(field.description));
            }
            properties.insert(field.name.clone(), Value::Object(prop));
        }
        json!({
            "title": self.name,
            "type": "object",
            "properties": properties,
            "required": self.required(),
        })
    }

    /// Check one record against the schema. Extra fields are allowed.
    pub fn validate(&self, record: &Value) -> Result<(), Vec<ValidationIssue>> {
        let Some(obj) = record.as_object() else {
            return Err(vec![ValidationIssue::NotAnObject]);
        };

        let issues: Vec<ValidationIssue> = self
            .fields
            .iter()
            .filter_map(|field| match obj.get(&field.name) {
                None => Some(ValidationIssue::MissingField(field.name.clone())),
                Some(v) if !field.kind.accepts(v) => Some(ValidationIssue::WrongKind {
                    field: field.name.clone(),
                    expected: field.kind.json_type(),
                }),
                Some(_) => None,
            })
            .collect();

        if issues.is_empty() { Ok(()) } else { Err(issues) }
    }
}
