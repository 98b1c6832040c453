//! Prompt text for every model call.
//!
//! Prompts are split the same way for each stage: a fixed system prompt,
//! then a user prompt with the dynamic content appended last.

use std::collections::BTreeMap;

use repcheck_core::{ChecklistItem, ComplianceVerdict, Compliance};

/// System prompt for per-item compliance analysis.
pub const ANALYSIS_SYSTEM_PROMPT: &str = "You are a scientific manuscript analyzer that evaluates \
compliance with reproducibility reporting guidelines. You output only valid JSON.";

/// System prompt for the free-text overview.
pub const OVERVIEW_SYSTEM_PROMPT: &str = "You are a scientific manuscript analyzer that summarizes \
compliance analysis results. Be concise and focus on key findings and actionable recommendations.";

/// System prompt for the batched category summaries.
pub const CATEGORIES_SYSTEM_PROMPT: &str = "You are a scientific manuscript analyzer that \
categorizes compliance issues. Return only valid JSON without any other text.";

/// System prompt for metadata extraction.
pub const METADATA_SYSTEM_PROMPT: &str = "You extract bibliographic metadata from scientific \
manuscripts. Return only valid JSON without any other text.";

/// Per-item analysis prompt, with the manuscript text last.
pub fn analysis_prompt(item: &ChecklistItem, manuscript_text: &str) -> String {
    let mut prompt = String::from(
        "Assess whether the manuscript below reports the following checklist item.\n\n",
    );
    prompt.push_str(&format!("Item {}: {}\n", item.item_id, item.question));
    if !item.description.is_empty() {
        prompt.push_str(&format!("Description: {}\n", item.description));
    }
    if !item.original.is_empty() {
        prompt.push_str(&format!("Guideline text: {}\n", item.original));
    }
    if !item.section.is_empty() {
        prompt.push_str(&format!("Usually reported in: {}\n", item.section));
    }
    prompt.push_str(&format!(
        r#"
Respond with a JSON object with exactly these fields:
{{
  "compliance": one of {},
  "explanation": "why this label applies",
  "quote": "verbatim supporting text from the manuscript, or empty",
  "section": "manuscript section the quote comes from, or empty"
}}
Use "Partial" when the item is addressed incompletely and "n/a" when it does not apply to this study.

Manuscript:
"#,
        quoted_tokens()
    ));
    prompt.push_str(manuscript_text);
    prompt
}

fn quoted_tokens() -> String {
    Compliance::TOKENS
        .iter()
        .map(|t| format!("\"{t}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render grouped verdicts as plain text for the summary prompts.
pub fn format_verdicts(groups: &BTreeMap<String, Vec<ComplianceVerdict>>) -> String {
    let mut out = String::new();
    for (category, verdicts) in groups {
        if verdicts.is_empty() {
            continue;
        }
        out.push_str(&format!("\nCategory: {category}\n"));
        for verdict in verdicts {
            out.push_str(&format!("\nItem {}:\n", verdict.item_id));
            out.push_str(&format!("Question: {}\n", verdict.question));
            out.push_str(&format!("Compliance: {}\n", verdict.compliance));
            out.push_str(&format!("Explanation: {}\n", verdict.explanation));
            if !verdict.quote.is_empty() {
                out.push_str(&format!("Quote: {}\n", verdict.quote));
            }
            if !verdict.section.is_empty() {
                out.push_str(&format!("Section: {}\n", verdict.section));
            }
        }
    }
    out
}

pub fn overview_prompt(manuscript_info: &str, formatted_verdicts: &str) -> String {
    format!(
        "Summarize the reproducibility reporting of this manuscript in one or two short paragraphs. \
Name the most important gaps and what the authors should add.\n\n\
Manuscript:\n{manuscript_info}\nResults:\n{formatted_verdicts}"
    )
}

pub fn categories_prompt(manuscript_info: &str, formatted_verdicts: &str, categories: &[String]) -> String {
    format!(
        r#"Summarize the compliance issues of this manuscript per category.
Categories: {}

Return a JSON object of this shape, with one entry per category that has issues:
{{
  "categories": {{
    "<category name>": {{"summary": "short description of the issues", "severity": "low" | "medium" | "high"}}
  }}
}}

Manuscript:
{manuscript_info}
Results:
{formatted_verdicts}"#,
        categories.join(", ")
    )
}

pub fn metadata_prompt(text: &str) -> String {
    format!(
        r#"Extract metadata from the beginning of this scientific manuscript.
Return a JSON object with these fields:
{{
  "title": "manuscript title",
  "authors": ["author names in order"],
  "doi": "DOI if printed, otherwise null",
  "abstract": "abstract text if present, otherwise null",
  "design": "study design, e.g. randomized controlled trial, otherwise null"
}}

Manuscript:
{text}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_analysis_prompt_ends_with_text() {
        let item = ChecklistItem::new("6.3", "Statistics", "Is the test named?")
            .with_description("Name each statistical test");
        let prompt = analysis_prompt(&item, "MANUSCRIPT BODY");
        assert!(prompt.contains("Item 6.3: Is the test named?"));
        assert!(prompt.contains("Description: Name each statistical test"));
        assert!(prompt.contains("\"n/a\""));
        assert!(prompt.ends_with("MANUSCRIPT BODY"));
    }

    #[test]
    fn test_format_verdicts_skips_empty_categories() {
        let mut groups = BTreeMap::new();
        groups.insert("Empty".to_string(), Vec::new());
        groups.insert(
            "Data".to_string(),
            vec![ComplianceVerdict {
                doi: "d".to_string(),
                item_id: "1.1".to_string(),
                question: "Shared?".to_string(),
                compliance: Compliance::No,
                explanation: "Not found".to_string(),
                quote: String::new(),
                section: "Methods".to_string(),
                created_at: Utc::now(),
            }],
        );
        let text = format_verdicts(&groups);
        assert!(text.contains("Category: Data"));
        assert!(!text.contains("Category: Empty"));
        assert!(text.contains("Compliance: No"));
        assert!(text.contains("Section: Methods"));
        assert!(!text.contains("Quote:"));
    }

    #[test]
    fn test_categories_prompt_lists_taxonomy() {
        let prompt = categories_prompt("Title: X\n", "results", &["A".to_string(), "B".to_string()]);
        assert!(prompt.contains("Categories: A, B"));
        assert!(prompt.contains("\"categories\""));
    }
}
