//! LLM output parsing and schema validation.
//!
//! Model responses rarely arrive as bare JSON: they're wrapped in fenced
//! code blocks, double-encoded as a JSON string, or padded with prose
//! around a single JSON object. `OutputValidator::validate` tries a fixed
//! sequence of extraction strategies and validates whichever one parses
//! against a caller-supplied JSON Schema.

use crate::safety::unsafe_key::{assert_safe_object, DEFAULT_MAX_DEPTH};
use jsonschema::Validator;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

pub const DEFAULT_MAX_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub success: bool,
    pub data: Option<Value>,
    pub errors: Vec<String>,
}

impl ValidationOutcome {
    fn failure(errors: Vec<String>) -> Self {
        Self { success: false, data: None, errors }
    }

    fn ok(data: Value) -> Self {
        Self { success: true, data: Some(data), errors: Vec::new() }
    }
}

pub struct OutputValidator {
    validator: Validator,
    max_bytes: usize,
}

impl OutputValidator {
    pub fn new(schema: &Value) -> anyhow::Result<Self> {
        let validator = jsonschema::validator_for(schema)?;
        Ok(Self { validator, max_bytes: DEFAULT_MAX_BYTES })
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Parses `text` via [`extract_json`], asserts the unsafe-key
    /// invariant, then validates the result against the schema. No single
    /// failure mode leaks a partial parse: `data` is only set on success.
    pub fn validate(&self, text: &str) -> ValidationOutcome {
        if text.len() > self.max_bytes {
            return ValidationOutcome::failure(vec![format!(
                "Invalid output: exceeds maximum size of {} bytes",
                self.max_bytes
            )]);
        }

        let value = match extract_json(text) {
            Some(v) => v,
            None => return ValidationOutcome::failure(vec!["Invalid output: no JSON could be parsed".to_string()]),
        };

        if let Err(e) = assert_safe_object(&value, DEFAULT_MAX_DEPTH) {
            return ValidationOutcome::failure(vec![e.to_string()]);
        }

        let errors: Vec<String> = self
            .validator
            .iter_errors(&value)
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect();

        if errors.is_empty() {
            ValidationOutcome::ok(value)
        } else {
            ValidationOutcome::failure(errors)
        }
    }
}

static FENCED_JSON: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```json\s*\n(.*?)```").unwrap());
static FENCED_ANY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```\s*\n?(.*?)```").unwrap());

fn balanced_brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Tries, in order: raw JSON; a ```json fenced block; any fenced block; a
/// balanced `{...}` span in free text; a JSON string containing JSON
/// (double-encoded); a JSON string containing a fenced block.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();

    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        return Some(v);
    }

    if let Some(caps) = FENCED_JSON.captures(trimmed) {
        if let Ok(v) = serde_json::from_str::<Value>(caps[1].trim()) {
            return Some(v);
        }
    }

    if let Some(caps) = FENCED_ANY.captures(trimmed) {
        if let Ok(v) = serde_json::from_str::<Value>(caps[1].trim()) {
            return Some(v);
        }
    }

    if let Some(span) = balanced_brace_span(trimmed) {
        if let Ok(v) = serde_json::from_str::<Value>(span) {
            return Some(v);
        }
    }

    if let Ok(Value::String(inner)) = serde_json::from_str::<Value>(trimmed) {
        if let Ok(v) = serde_json::from_str::<Value>(inner.trim()) {
            return Some(v);
        }
        if let Some(caps) = FENCED_JSON.captures(&inner).or_else(|| FENCED_ANY.captures(&inner)) {
            if let Ok(v) = serde_json::from_str::<Value>(caps[1].trim()) {
                return Some(v);
            }
        }
    }

    None
}
