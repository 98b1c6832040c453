//! Checklist parsing from YAML/JSON.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use thiserror::Error;

use super::schema::validate_checklist_schema;
use crate::types::{compare_item_ids, ChecklistItem};

/// Category given to imported items that carry no title.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Errors that can occur when loading checklists.
#[derive(Error, Debug)]
pub enum ChecklistError {
    #[error("Failed to read checklist file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Checklist validation failed: {}", .0.join("; "))]
    SchemaError(Vec<String>),

    #[error("Duplicate item ID: {0}")]
    DuplicateItemId(String),

    #[error("Unsupported checklist format: {0}")]
    UnsupportedFormat(String),
}

/// An ordered, validated set of checklist items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Checklist {
    items: Vec<ChecklistItem>,
}

impl Checklist {
    /// Build a checklist from items, rejecting duplicate IDs.
    ///
    /// Items are put in dotted-ordinal order.
    pub fn from_items(mut items: Vec<ChecklistItem>) -> Result<Self, ChecklistError> {
        let mut seen = HashSet::new();
        for item in &items {
            if !seen.insert(item.item_id.as_str()) {
                return Err(ChecklistError::DuplicateItemId(item.item_id.clone()));
            }
        }
        items.sort_by(|a, b| compare_item_ids(&a.item_id, &b.item_id));
        Ok(Self { items })
    }

    /// Parse a checklist from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ChecklistError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parse a checklist from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ChecklistError> {
        let value: Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ChecklistError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ChecklistError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load by file extension (`.json`, `.yaml`, `.yml`).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ChecklistError> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") | Some("txt") => Self::from_json_file(path),
            Some("yaml") | Some("yml") => Self::from_yaml_file(path),
            other => Err(ChecklistError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }

    /// Validate and convert a parsed document.
    ///
    /// Accepts a bare array or an object with an `items` array, and the
    /// import shape that uses `checklist_item_id` and `title`.
    fn from_value(value: Value) -> Result<Self, ChecklistError> {
        let entries = match value {
            Value::Array(entries) => entries,
            Value::Object(mut obj) => match obj.remove("items") {
                Some(Value::Array(entries)) => entries,
                _ => {
                    return Err(ChecklistError::SchemaError(vec![
                        "expected an array of items or an object with an `items` array".to_string(),
                    ]))
                }
            },
            _ => {
                return Err(ChecklistError::SchemaError(vec![
                    "expected an array of items".to_string(),
                ]))
            }
        };

        let normalized = Value::Array(entries.into_iter().map(normalize_entry).collect());
        validate_checklist_schema(&normalized).map_err(ChecklistError::SchemaError)?;

        let items: Vec<ChecklistItem> = serde_json::from_value(normalized)?;
        Self::from_items(items)
    }

    pub fn items(&self) -> &[ChecklistItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<ChecklistItem> {
        self.items
    }

    pub fn get(&self, item_id: &str) -> Option<&ChecklistItem> {
        self.items.iter().find(|i| i.item_id == item_id)
    }

    /// Sorted, de-duplicated category names.
    pub fn categories(&self) -> Vec<String> {
        self.items
            .iter()
            .map(|i| i.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Rename import-shape keys to the native ones.
fn normalize_entry(entry: Value) -> Value {
    let Value::Object(mut obj) = entry else {
        return entry;
    };
    rename_key(&mut obj, "checklist_item_id", "item_id");
    rename_key(&mut obj, "title", "category");
    if !obj.contains_key("category") {
        obj.insert("category".to_string(), Value::String(UNCATEGORIZED.to_string()));
    }
    Value::Object(obj)
}

fn rename_key(obj: &mut Map<String, Value>, from: &str, to: &str) {
    if obj.contains_key(to) {
        return;
    }
    if let Some(value) = obj.remove(from) {
        obj.insert(to.to_string(), value);
    }
}
