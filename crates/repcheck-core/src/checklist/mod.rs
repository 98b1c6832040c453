//! Checklist loading and validation.
//!
//! Checklists are structured data validated against JSON Schema.
//! This module handles parsing YAML/JSON checklists and validating them.

mod parser;
mod schema;

pub use parser::{Checklist, ChecklistError, UNCATEGORIZED};
pub use schema::validate_checklist_schema;
