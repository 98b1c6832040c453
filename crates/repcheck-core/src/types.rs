//! Record types shared by every stage of the pipeline.
//!
//! These are explicit, fixed-field records. Nothing downstream of the
//! [`ResponseValidator`](crate::validator::ResponseValidator) ever sees a raw
//! model string where an enum is expected.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One reproducibility-reporting question from a checklist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChecklistItem {
    /// Dotted ordinal, e.g. "6.3"
    pub item_id: String,

    /// Category used to group verdicts in summaries
    pub category: String,

    /// The question the model is asked to judge
    pub question: String,

    /// Longer description of what satisfies the item
    #[serde(default)]
    pub description: String,

    /// Guidance text as written in the source guideline
    #[serde(default)]
    pub original: String,

    /// Manuscript section where this is usually reported
    #[serde(default)]
    pub section: String,
}

impl ChecklistItem {
    pub fn new(
        item_id: impl Into<String>,
        category: impl Into<String>,
        question: impl Into<String>,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            category: category.into(),
            question: question.into(),
            description: String::new(),
            original: String::new(),
            section: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = section.into();
        self
    }
}

/// Compare two dotted ordinals numerically ("6.10" sorts after "6.9").
///
/// Non-numeric segments fall back to lexical comparison.
pub fn compare_item_ids(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    _ => l.cmp(r),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Compliance label for a single checklist item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Compliance {
    Yes,
    No,
    Partial,
    #[serde(rename = "n/a")]
    NotApplicable,
}

impl Compliance {
    /// Canonical tokens, in the order the model is told about them.
    pub const TOKENS: [&'static str; 4] = ["Yes", "No", "Partial", "n/a"];

    /// Legacy spellings of the not-applicable label.
    pub const NOT_APPLICABLE_ALIASES: [&'static str; 4] = ["N/A", "NA", "NotApplicable", "not applicable"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Compliance::Yes => "Yes",
            Compliance::No => "No",
            Compliance::Partial => "Partial",
            Compliance::NotApplicable => "n/a",
        }
    }

    /// Whether this label counts as a reporting problem.
    pub fn is_issue(&self) -> bool {
        matches!(self, Compliance::No | Compliance::Partial)
    }
}

impl fmt::Display for Compliance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Compliance {
    type Err = String;

    /// Case-insensitive parse of the canonical tokens and the legacy
    /// not-applicable aliases.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        let matches = |token: &str| value.eq_ignore_ascii_case(token);

        if matches("Yes") {
            Ok(Compliance::Yes)
        } else if matches("No") {
            Ok(Compliance::No)
        } else if matches("Partial") {
            Ok(Compliance::Partial)
        } else if matches("n/a") || Self::NOT_APPLICABLE_ALIASES.iter().any(|a| matches(a)) {
            Ok(Compliance::NotApplicable)
        } else {
            Err(format!("unknown compliance label: {value}"))
        }
    }
}

/// Per-item, per-manuscript compliance judgment plus supporting evidence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComplianceVerdict {
    pub doi: String,
    pub item_id: String,
    pub question: String,
    pub compliance: Compliance,
    pub explanation: String,

    /// Supporting quote from the manuscript (possibly empty)
    #[serde(default)]
    pub quote: String,

    /// Manuscript section the quote came from (possibly empty)
    #[serde(default)]
    pub section: String,

    pub created_at: DateTime<Utc>,
}

impl ComplianceVerdict {
    /// Verdict recorded when an item could not be analyzed.
    pub fn fallback(doi: &str, item: &ChecklistItem, reason: impl fmt::Display) -> Self {
        Self {
            doi: doi.to_string(),
            item_id: item.item_id.clone(),
            question: item.question.clone(),
            compliance: Compliance::NotApplicable,
            explanation: format!("Analysis failed: {reason}"),
            quote: String::new(),
            section: String::new(),
            created_at: Utc::now(),
        }
    }
}

/// Aggregated risk indicator for a category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Display rank: High first.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::High => 0,
            Severity::Medium => 1,
            Severity::Low => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// Summary of all verdicts sharing a category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategorySummary {
    pub category: String,
    pub summary: String,
    pub severity: Severity,
    pub member_verdicts: Vec<ComplianceVerdict>,
}

/// Manuscript-level summary. One per DOI; replaced whole on rerun.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisSummary {
    pub doi: String,
    pub overview: String,
    pub category_summaries: Vec<CategorySummary>,
    pub created_at: DateTime<Utc>,
}

/// Manuscript being analyzed. Only the DOI is required.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Manuscript {
    pub doi: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub authors: Vec<String>,

    #[serde(default, rename = "abstract")]
    pub abstract_text: String,

    /// Study design, e.g. "randomized controlled trial"
    #[serde(default)]
    pub design: String,
}

impl Manuscript {
    pub fn new(doi: impl Into<String>) -> Self {
        Self {
            doi: doi.into(),
            ..Default::default()
        }
    }

    /// Short header used in summarization prompts.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        if !self.title.is_empty() {
            out.push_str(&format!("Title: {}\n", self.title));
        }
        if !self.authors.is_empty() {
            out.push_str(&format!("Authors: {}\n", self.authors.join(", ")));
        }
        out.push_str(&format!("DOI: {}\n", self.doi));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compliance_serializes_canonical_tokens() {
        assert_eq!(serde_json::to_string(&Compliance::Yes).unwrap(), "\"Yes\"");
        assert_eq!(
            serde_json::to_string(&Compliance::NotApplicable).unwrap(),
            "\"n/a\""
        );
        let parsed: Compliance = serde_json::from_str("\"n/a\"").unwrap();
        assert_eq!(parsed, Compliance::NotApplicable);
    }

    #[test]
    fn test_compliance_parse_accepts_legacy_aliases() {
        for alias in ["N/A", "n/a", "NotApplicable", "not applicable", "NA"] {
            assert_eq!(alias.parse::<Compliance>(), Ok(Compliance::NotApplicable));
        }
        assert_eq!(" yes ".parse::<Compliance>(), Ok(Compliance::Yes));
        assert!("Maybe".parse::<Compliance>().is_err());
    }

    #[test]
    fn test_severity_round_trip_lowercase() {
        assert_eq!(serde_json::to_string(&Severity::High).unwrap(), "\"high\"");
        assert_eq!("MEDIUM".parse::<Severity>(), Ok(Severity::Medium));
        assert!(Severity::High.rank() < Severity::Medium.rank());
        assert!(Severity::Medium.rank() < Severity::Low.rank());
    }

    #[test]
    fn test_item_id_ordering_is_numeric() {
        assert_eq!(compare_item_ids("6.9", "6.10"), Ordering::Less);
        assert_eq!(compare_item_ids("2", "10"), Ordering::Less);
        assert_eq!(compare_item_ids("1.1", "1.1"), Ordering::Equal);
        assert_eq!(compare_item_ids("1", "1.1"), Ordering::Less);
    }

    #[test]
    fn test_fallback_verdict_is_not_applicable() {
        let item = ChecklistItem::new("1.1", "Data", "Is data shared?");
        let verdict = ComplianceVerdict::fallback("10.1/x", &item, "rate limited");
        assert_eq!(verdict.compliance, Compliance::NotApplicable);
        assert!(verdict.explanation.contains("rate limited"));
        assert_eq!(verdict.item_id, "1.1");
    }

    #[test]
    fn test_manuscript_describe() {
        let mut manuscript = Manuscript::new("10.1000/xyz");
        manuscript.title = "A study".to_string();
        manuscript.authors = vec!["A. One".to_string(), "B. Two".to_string()];
        let text = manuscript.describe();
        assert!(text.contains("Title: A study"));
        assert!(text.contains("A. One, B. Two"));
        assert!(text.contains("DOI: 10.1000/xyz"));
    }
}
