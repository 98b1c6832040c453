//! Validation of raw model responses.
//!
//! A model is asked for a JSON object but may wrap it in markdown fences,
//! prepend commentary, drop fields or invent enum values. The validator
//! recovers what it safely can and rejects the rest:
//!
//! 1. Unless the text is already a balanced object, strip a markdown fence
//!    wrapping the whole response (with or without a `json` tag).
//! 2. If the text is not a balanced object on its own, slice from the first
//!    `{` to the last `}`.
//! 3. Parse; a parse failure is [`ValidationError::MalformedJson`].
//! 4. Check required fields; every missing name is reported at once.
//! 5. Clamp out-of-range enum values to a default and record a note.
//! 6. Trim every string value.
//!
//! Whether to retry on error is the caller's decision.

use std::collections::BTreeMap;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

lazy_static! {
    /// A fence opening the response, with an optional language tag.
    static ref LEADING_FENCE: Regex = Regex::new(r"^\s*```[A-Za-z]*[ \t]*\r?\n?").unwrap();

    static ref TRAILING_FENCE: Regex = Regex::new(r"\s*```\s*$").unwrap();
}

/// Reasons a response cannot be accepted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("malformed json: {0}")]
    MalformedJson(String),

    #[error("response is not a JSON object")]
    NotAnObject,

    #[error("missing fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("schema violations: {}", .0.join("; "))]
    Schema(Vec<String>),
}

/// Allowed values for one enum-typed field.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumConstraint {
    allowed: Vec<String>,
    aliases: Vec<(String, String)>,
    default: String,
}

impl EnumConstraint {
    pub fn new<I, S>(allowed: I, default: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
            aliases: Vec::new(),
            default: default.into(),
        }
    }

    /// Accept `alias` as a spelling of the allowed value `canonical`.
    pub fn with_alias(mut self, alias: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.aliases.push((alias.into(), canonical.into()));
        self
    }

    pub fn default_value(&self) -> &str {
        &self.default
    }

    /// Canonical spelling of `value`, matched case-insensitively.
    pub fn resolve(&self, value: &str) -> Option<&str> {
        let value = value.trim();
        self.allowed
            .iter()
            .find(|a| a.eq_ignore_ascii_case(value))
            .map(String::as_str)
            .or_else(|| {
                self.aliases
                    .iter()
                    .find(|(alias, _)| alias.eq_ignore_ascii_case(value))
                    .map(|(_, canonical)| canonical.as_str())
            })
    }
}

/// Expected shape of a response object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseSchema {
    required: Vec<String>,
    enums: BTreeMap<String, EnumConstraint>,
}

impl ResponseSchema {
    pub fn new<I, S>(required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required: required.into_iter().map(Into::into).collect(),
            enums: BTreeMap::new(),
        }
    }

    pub fn with_enum(mut self, field: impl Into<String>, constraint: EnumConstraint) -> Self {
        self.enums.insert(field.into(), constraint);
        self
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }
}

/// An accepted response object.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRecord {
    fields: Map<String, Value>,
    notes: Vec<String>,
}

impl ValidatedRecord {
    /// String value of a field; null, absent and non-string values read as "".
    pub fn get_str(&self, name: &str) -> &str {
        self.fields.get(name).and_then(Value::as_str).unwrap_or("")
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Diagnostics attached while clamping enum values.
    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

/// Validator for one response schema, optionally backed by a JSON Schema.
#[derive(Clone)]
pub struct ResponseValidator {
    schema: ResponseSchema,
    json_schema: Option<Arc<jsonschema::Validator>>,
}

impl std::fmt::Debug for ResponseValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseValidator")
            .field("schema", &self.schema)
            .field("json_schema", &self.json_schema.is_some())
            .finish()
    }
}

impl ResponseValidator {
    pub fn new(schema: ResponseSchema) -> Self {
        Self {
            schema,
            json_schema: None,
        }
    }

    /// Additionally check accepted records against a JSON Schema document.
    pub fn with_json_schema(mut self, document: &Value) -> Result<Self, ValidationError> {
        let compiled = jsonschema::options()
            .build(document)
            .map_err(|e| ValidationError::Schema(vec![format!("invalid schema: {e}")]))?;
        self.json_schema = Some(Arc::new(compiled));
        Ok(self)
    }

    pub fn schema(&self) -> &ResponseSchema {
        &self.schema
    }

    /// Validate a raw model response.
    pub fn validate(&self, raw_response: &str) -> Result<ValidatedRecord, ValidationError> {
        let mut fields = parse_object(raw_response)?;

        let missing: Vec<String> = self
            .schema
            .required
            .iter()
            .filter(|name| !fields.contains_key(name.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing));
        }

        let mut notes = Vec::new();
        for (field, constraint) in &self.schema.enums {
            let Some(current) = fields.get(field) else {
                continue;
            };
            let resolved = current.as_str().and_then(|s| constraint.resolve(s));
            match resolved {
                Some(canonical) => {
                    let canonical = canonical.to_string();
                    fields.insert(field.clone(), Value::String(canonical));
                }
                None => {
                    let note = format!(
                        "{field}: unexpected value {current} replaced with \"{}\"",
                        constraint.default
                    );
                    tracing::warn!(field = %field, value = %current, "Clamped out-of-range enum value");
                    notes.push(note);
                    fields.insert(field.clone(), Value::String(constraint.default.clone()));
                }
            }
        }

        for value in fields.values_mut() {
            if let Value::String(s) = value {
                let trimmed = s.trim();
                if trimmed.len() != s.len() {
                    *s = trimmed.to_string();
                }
            }
        }

        if let Some(json_schema) = &self.json_schema {
            let instance = Value::Object(fields);
            let errors: Vec<String> = json_schema
                .iter_errors(&instance)
                .map(|e| format!("{} at {}", e, e.instance_path))
                .collect();
            if !errors.is_empty() {
                return Err(ValidationError::Schema(errors));
            }
            let Value::Object(map) = instance else {
                return Err(ValidationError::NotAnObject);
            };
            fields = map;
        }

        Ok(ValidatedRecord { fields, notes })
    }
}

/// Remove a markdown code fence wrapping the whole response.
///
/// Only a fence that opens the trimmed text counts; fences further in,
/// such as one quoted inside a string value, are left alone. A missing
/// closing fence (truncated output) is tolerated.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(opening) = LEADING_FENCE.find(trimmed) else {
        return trimmed;
    };
    let rest = &trimmed[opening.end()..];
    let end = TRAILING_FENCE.find(rest).map(|m| m.start()).unwrap_or(rest.len());
    rest[..end].trim()
}

/// The outermost `{...}` span, if the text has one.
pub fn extract_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if start <= end {
        Some(&text[start..=end])
    } else {
        None
    }
}

/// Whether `text` is exactly one brace-balanced object.
///
/// Braces inside string literals are ignored.
fn is_balanced_object(text: &str) -> bool {
    if !text.starts_with('{') {
        return false;
    }
    let mut depth: i64 = 0;
    let mut in_string = false;
    let mut escaped = false;
    for (idx, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return idx + c.len_utf8() == text.len();
                }
            }
            _ => {}
        }
    }
    false
}

/// Steps 1-3 of validation: clean a response and parse the object it holds.
pub fn parse_object(raw_response: &str) -> Result<Map<String, Value>, ValidationError> {
    let trimmed = raw_response.trim();
    let cleaned = if is_balanced_object(trimmed) {
        trimmed
    } else {
        strip_code_fences(trimmed)
    };
    let candidate = if is_balanced_object(cleaned) {
        cleaned
    } else {
        extract_object(cleaned)
            .ok_or_else(|| ValidationError::MalformedJson("no JSON object found".to_string()))?
    };

    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ValidationError::NotAnObject),
        Err(e) => Err(ValidationError::MalformedJson(e.to_string())),
    }
}
