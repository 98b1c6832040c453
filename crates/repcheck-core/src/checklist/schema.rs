//! JSON Schema validation for checklists.
//!
//! Checklists are validated against schema/checklist.schema.json, which is
//! embedded at compile time and compiled once.

use std::sync::OnceLock;
use thiserror::Error;

/// Embedded checklist schema (loaded at compile time).
const CHECKLIST_SCHEMA_JSON: &str = include_str!("../../../../schema/checklist.schema.json");

/// Compiled JSON Schema validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

/// Errors from schema loading.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to load schema: {0}")]
    LoadError(String),
}

fn get_validator() -> Result<&'static jsonschema::Validator, SchemaError> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = serde_json::from_str(CHECKLIST_SCHEMA_JSON)
            .map_err(|e| format!("Invalid schema JSON: {}", e))?;

        jsonschema::options()
            .build(&schema_value)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });

    result
        .as_ref()
        .map_err(|e| SchemaError::LoadError(e.clone()))
}

/// Validate a checklist document (an array of items) against the schema.
///
/// Returns every violation, not just the first.
pub fn validate_checklist_schema(checklist_json: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e.to_string()])?;

    let errors: Vec<String> = validator
        .iter_errors(checklist_json)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_checklist_passes() {
        let value = json!([
            {"item_id": "1.1", "category": "Data", "question": "Is data available?"},
            {"item_id": "2", "category": "Code", "question": "Is code available?", "section": "Methods"}
        ]);
        assert!(validate_checklist_schema(&value).is_ok());
    }

    #[test]
    fn test_bad_item_id_fails() {
        let value = json!([
            {"item_id": "A1", "category": "Data", "question": "Q"}
        ]);
        assert!(validate_checklist_schema(&value).is_err());
    }

    #[test]
    fn test_all_errors_collected() {
        let value = json!([
            {"item_id": "x", "category": "", "question": ""}
        ]);
        let errors = validate_checklist_schema(&value).unwrap_err();
        assert!(errors.len() >= 3);
    }

    #[test]
    fn test_unknown_property_fails() {
        let value = json!([
            {"item_id": "1", "category": "Data", "question": "Q", "weight": 3}
        ]);
        assert!(validate_checklist_schema(&value).is_err());
    }
}
