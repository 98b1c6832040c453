//! # repcheck-core
//!
//! Deterministic building blocks for reproducibility checklist analysis.
//!
//! This crate holds everything in the pipeline that does not talk to a model:
//! - the record types (checklist items, verdicts, summaries)
//! - checklist loading and schema validation
//! - fitting manuscript text into an input budget
//! - validating raw model responses
//! - the severity heuristic and category grouping used by summaries
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same input always produces same output
//! 2. **No LLM calls**: model access lives in `repcheck-runtime`
//! 3. **Typed labels**: compliance and severity are enums once validated
//!
//! ## Example
//!
//! ```rust,ignore
//! use repcheck_core::{Checklist, TakeFrom, TextBudgetFitter};
//!
//! let checklist = Checklist::from_yaml_file("checklist.yaml")?;
//! let fitter = TextBudgetFitter::default();
//! let text = fitter.fit(&manuscript_text, 100_000, TakeFrom::Tail);
//! for item in checklist.items() {
//!     println!("{} [{}] {}", item.item_id, item.category, item.question);
//! }
//! ```

pub mod aggregate;
pub mod checklist;
pub mod fitter;
pub mod types;
pub mod validator;

// Re-export main types at crate root
pub use aggregate::{
    default_category_summary, deterministic_overview, group_by_category,
    heuristic_category_summary, heuristic_severity, heuristic_summary, sort_summaries,
    ComplianceTally, DEFAULT_SUMMARY, OTHER_CATEGORY,
};
pub use checklist::{Checklist, ChecklistError};
pub use fitter::{fit, CharRatioEstimator, TakeFrom, TextBudgetFitter, UnitEstimator};
pub use types::{
    compare_item_ids, AnalysisSummary, CategorySummary, ChecklistItem, Compliance,
    ComplianceVerdict, Manuscript, Severity,
};
pub use validator::{
    extract_object, parse_object, strip_code_fences, EnumConstraint, ResponseSchema,
    ResponseValidator, ValidatedRecord, ValidationError,
};
