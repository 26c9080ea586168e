// src/inference/parser.rs
//! Recover JSON from free-text LLM completions.
//!
//! Completions come in three shapes: prose around a fenced ```json block
//! (most common), prose with an inline object, or bare JSON. The parser
//! tries them in that order and never fails. When nothing parses it returns
//! a fixed single-field schema.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Map, Value};

/// Upper bound on brace candidates tried by the embedded scan.
const MAX_EMBEDDED_CANDIDATES: usize = 64;

static FENCE_RE: OnceLock<Regex> = OnceLock::new();

/// Which tier of the fallback chain produced the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseSource {
    Fenced,
    Embedded,
    Whole,
    Fallback,
}

impl ParseSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ParseSource::Fenced => "fenced",
            ParseSource::Embedded => "embedded",
            ParseSource::Whole => "whole",
            ParseSource::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSchema {
    pub object: Map<String, Value>,
    pub source: ParseSource,
}

/// What kind of JSON value the caller is willing to accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonShape {
    Object,
    ObjectOrArray,
}

impl JsonShape {
    fn accepts(self, value: &Value) -> bool {
        match self {
            JsonShape::Object => value.is_object(),
            JsonShape::ObjectOrArray => value.is_object() || value.is_array(),
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse a schema-generation completion into a JSON object.
pub fn parse_schema_response(raw: &str) -> ParsedSchema {
    match extract_json(raw, JsonShape::Object) {
        Some((Value::Object(object), source)) => ParsedSchema { object, source },
        _ => {
            tracing::warn!(
                chars = raw.len(),
                "schema parser: no JSON object in completion, using fallback schema"
            );
            ParsedSchema { object: fallback_schema(), source: ParseSource::Fallback }
        }
    }
}

/// `{properties: {content: {type: string, description: "Extracted content"}}}`
pub fn fallback_schema() -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert(
        "content".into(),
        json!({ "type": "string", "description": "Extracted content" }),
    );
    let mut schema = Map::new();
    schema.insert("properties".into(), Value::Object(properties));
    schema
}

/// Find the first JSON value of the requested shape in `raw`, trying fenced
/// blocks, then brace-delimited substrings, then the whole text.
pub fn extract_json(raw: &str, shape: JsonShape) -> Option<(Value, ParseSource)> {
    from_fenced_block(raw, shape)
        .map(|v| (v, ParseSource::Fenced))
        .or_else(|| from_embedded(raw, shape).map(|v| (v, ParseSource::Embedded)))
        .or_else(|| from_whole_text(raw, shape).map(|v| (v, ParseSource::Whole)))
}

// ---------------------------------------------------------------------------
// Tiers
// ---------------------------------------------------------------------------

fn from_fenced_block(raw: &str, shape: JsonShape) -> Option<Value> {
    let re = FENCE_RE.get_or_init(|| {
        Regex::new(r"(?s)```[ \t]*(?:json|JSON)?[ \t]*\r?\n?(.*?)```").expect("fence pattern is valid")
    });
    re.captures_iter(raw)
        .filter_map(|cap| cap.get(1))
        .find_map(|m| parse_as(m.as_str().trim(), shape))
}

fn from_embedded(raw: &str, shape: JsonShape) -> Option<Value> {
    let openers: &[u8] = match shape {
        JsonShape::Object => b"{",
        JsonShape::ObjectOrArray => b"{[",
    };
    raw.char_indices()
        .filter(|(_, c)| c.is_ascii() && openers.contains(&(*c as u8)))
        .take(MAX_EMBEDDED_CANDIDATES)
        .filter_map(|(start, _)| balanced_span(raw, start))
        .find_map(|span| parse_as(span, shape))
}

fn from_whole_text(raw: &str, shape: JsonShape) -> Option<Value> {
    parse_as(raw.trim(), shape)
}

fn parse_as(candidate: &str, shape: JsonShape) -> Option<Value> {
    if candidate.is_empty() {
        return None;
    }
    serde_json::from_str::<Value>(candidate)
        .ok()
        .filter(|v| shape.accepts(v))
}

/// Slice from the opening bracket at `start` to its matching close,
/// ignoring brackets inside string literals.
fn balanced_span(text: &str, start: usize) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut stack: Vec<u8> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => stack.push(b'}'),
            b'[' => stack.push(b']'),
            b'}' | b']' => {
                if stack.pop() != Some(b) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
