//! Deterministic aggregation of verdicts into category summaries.
//!
//! The severity heuristic is fixed policy:
//! 1. If ANY verdict in a category is `No` -> `High`
//! 2. Else if ANY verdict is `Partial` -> `Medium`
//! 3. Else -> `Low`
//!
//! It is the fallback whenever a model-written category summary is unusable.

use std::collections::BTreeMap;

use crate::types::{compare_item_ids, CategorySummary, ChecklistItem, Compliance, ComplianceVerdict, Severity};

/// Category for verdicts whose item is not in the checklist.
pub const OTHER_CATEGORY: &str = "Other";

/// Summary text for a category with nothing to report.
pub const DEFAULT_SUMMARY: &str = "ok.";

/// Counts of each compliance label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComplianceTally {
    pub yes: usize,
    pub no: usize,
    pub partial: usize,
    pub not_applicable: usize,
}

impl ComplianceTally {
    pub fn from_verdicts<'a>(verdicts: impl IntoIterator<Item = &'a ComplianceVerdict>) -> Self {
        let mut tally = Self::default();
        for verdict in verdicts {
            tally.add(verdict.compliance);
        }
        tally
    }

    pub fn add(&mut self, compliance: Compliance) {
        match compliance {
            Compliance::Yes => self.yes += 1,
            Compliance::No => self.no += 1,
            Compliance::Partial => self.partial += 1,
            Compliance::NotApplicable => self.not_applicable += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.yes + self.no + self.partial + self.not_applicable
    }

    /// Number of verdicts that count towards the score.
    pub fn scored(&self) -> usize {
        self.yes + self.no + self.partial
    }

    /// Yes = 1, Partial = 0.5, No = 0, averaged over scored verdicts.
    ///
    /// `None` when only not-applicable verdicts (or none) exist.
    pub fn score(&self) -> Option<f64> {
        let scored = self.scored();
        if scored == 0 {
            return None;
        }
        Some((self.yes as f64 + 0.5 * self.partial as f64) / scored as f64)
    }
}

/// Severity from compliance labels alone.
pub fn heuristic_severity(verdicts: &[ComplianceVerdict]) -> Severity {
    if verdicts.iter().any(|v| v.compliance == Compliance::No) {
        Severity::High
    } else if verdicts.iter().any(|v| v.compliance == Compliance::Partial) {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Plain summary naming the items that need attention.
pub fn heuristic_summary(verdicts: &[ComplianceVerdict]) -> String {
    let ids_with = |label: Compliance| -> Vec<&str> {
        verdicts
            .iter()
            .filter(|v| v.compliance == label)
            .map(|v| v.item_id.as_str())
            .collect()
    };
    let missing = ids_with(Compliance::No);
    let partial = ids_with(Compliance::Partial);

    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("Not reported: {}", missing.join(", ")));
    }
    if !partial.is_empty() {
        parts.push(format!("Partially reported: {}", partial.join(", ")));
    }

    if parts.is_empty() {
        DEFAULT_SUMMARY.to_string()
    } else {
        format!("{}.", parts.join(". "))
    }
}

/// Summary for a category with no verdicts.
pub fn default_category_summary(category: impl Into<String>) -> CategorySummary {
    CategorySummary {
        category: category.into(),
        summary: DEFAULT_SUMMARY.to_string(),
        severity: Severity::Low,
        member_verdicts: Vec::new(),
    }
}

/// Summary built entirely from the heuristic.
pub fn heuristic_category_summary(
    category: impl Into<String>,
    verdicts: Vec<ComplianceVerdict>,
) -> CategorySummary {
    CategorySummary {
        category: category.into(),
        summary: heuristic_summary(&verdicts),
        severity: heuristic_severity(&verdicts),
        member_verdicts: verdicts,
    }
}

/// Group verdicts by checklist category.
///
/// Every category named by `items` appears, even with no verdicts.
/// Verdicts for unknown item IDs land in [`OTHER_CATEGORY`]. Members are
/// kept in item ordinal order.
pub fn group_by_category(
    verdicts: &[ComplianceVerdict],
    items: &[ChecklistItem],
) -> BTreeMap<String, Vec<ComplianceVerdict>> {
    let category_of: BTreeMap<&str, &str> = items
        .iter()
        .map(|i| (i.item_id.as_str(), i.category.as_str()))
        .collect();

    let mut groups: BTreeMap<String, Vec<ComplianceVerdict>> = items
        .iter()
        .map(|i| (i.category.clone(), Vec::new()))
        .collect();

    for verdict in verdicts {
        let category = category_of
            .get(verdict.item_id.as_str())
            .copied()
            .unwrap_or(OTHER_CATEGORY);
        groups
            .entry(category.to_string())
            .or_default()
            .push(verdict.clone());
    }

    for members in groups.values_mut() {
        members.sort_by(|a, b| compare_item_ids(&a.item_id, &b.item_id));
    }

    groups
}

/// Order High, Medium, Low; ties alphabetical by category.
pub fn sort_summaries(summaries: &mut [CategorySummary]) {
    summaries.sort_by(|a, b| {
        a.severity
            .rank()
            .cmp(&b.severity.rank())
            .then_with(|| a.category.cmp(&b.category))
    });
}

/// One-paragraph overview from counts, used when no model overview exists.
pub fn deterministic_overview(tally: &ComplianceTally, summaries: &[CategorySummary]) -> String {
    let mut overview = format!(
        "{} checklist items assessed: {} reported, {} partially reported, {} not reported, {} not applicable.",
        tally.total(),
        tally.yes,
        tally.partial,
        tally.no,
        tally.not_applicable
    );

    if let Some(score) = tally.score() {
        overview.push_str(&format!(" Compliance score: {:.0}%.", score * 100.0));
    }

    let flagged: Vec<&str> = summaries
        .iter()
        .filter(|s| s.severity == Severity::High)
        .map(|s| s.category.as_str())
        .collect();
    if !flagged.is_empty() {
        overview.push_str(&format!(" Categories needing attention: {}.", flagged.join(", ")));
    }

    overview
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    fn verdict(item_id: &str, compliance: Compliance) -> ComplianceVerdict {
        ComplianceVerdict {
            doi: "10.1/test".to_string(),
            item_id: item_id.to_string(),
            question: format!("Question {item_id}"),
            compliance,
            explanation: String::new(),
            quote: String::new(),
            section: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_severity_no_wins() {
        let verdicts = vec![
            verdict("1", Compliance::No),
            verdict("2", Compliance::Partial),
            verdict("3", Compliance::Yes),
        ];
        assert_eq!(heuristic_severity(&verdicts), Severity::High);
    }

    #[test]
    fn test_severity_partial_then_low() {
        let verdicts = vec![verdict("1", Compliance::Partial), verdict("2", Compliance::Yes)];
        assert_eq!(heuristic_severity(&verdicts), Severity::Medium);

        let verdicts = vec![verdict("1", Compliance::NotApplicable), verdict("2", Compliance::Yes)];
        assert_eq!(heuristic_severity(&verdicts), Severity::Low);
        assert_eq!(heuristic_severity(&[]), Severity::Low);
    }

    #[test]
    fn test_heuristic_summary_names_items() {
        let verdicts = vec![
            verdict("1.1", Compliance::No),
            verdict("1.2", Compliance::Partial),
            verdict("1.3", Compliance::Yes),
        ];
        let summary = heuristic_summary(&verdicts);
        assert!(summary.contains("Not reported: 1.1"));
        assert!(summary.contains("Partially reported: 1.2"));

        assert_eq!(heuristic_summary(&[verdict("2", Compliance::Yes)]), "ok.");
    }

    #[test]
    fn test_grouping_includes_every_category() {
        let items = vec![
            ChecklistItem::new("1.1", "A", "q"),
            ChecklistItem::new("2.1", "B", "q"),
            ChecklistItem::new("3.1", "C", "q"),
        ];
        let verdicts = vec![verdict("1.1", Compliance::No), verdict("9.9", Compliance::Yes)];
        let groups = group_by_category(&verdicts, &items);

        assert_eq!(groups.len(), 4);
        assert_eq!(groups["A"].len(), 1);
        assert!(groups["B"].is_empty());
        assert!(groups["C"].is_empty());
        assert_eq!(groups[OTHER_CATEGORY][0].item_id, "9.9");
    }

    #[test]
    fn test_group_members_in_ordinal_order() {
        let items = vec![
            ChecklistItem::new("1.10", "A", "q"),
            ChecklistItem::new("1.9", "A", "q"),
        ];
        let verdicts = vec![verdict("1.10", Compliance::Yes), verdict("1.9", Compliance::Yes)];
        let groups = group_by_category(&verdicts, &items);
        let ids: Vec<&str> = groups["A"].iter().map(|v| v.item_id.as_str()).collect();
        assert_eq!(ids, vec!["1.9", "1.10"]);
    }

    #[test]
    fn test_tally_score() {
        let verdicts = vec![
            verdict("1", Compliance::Yes),
            verdict("2", Compliance::Partial),
            verdict("3", Compliance::No),
            verdict("4", Compliance::NotApplicable),
        ];
        let tally = ComplianceTally::from_verdicts(&verdicts);
        assert_eq!(tally.total(), 4);
        assert_eq!(tally.scored(), 3);
        assert_eq!(tally.score(), Some(0.5));

        let only_na = ComplianceTally::from_verdicts(&[verdict("1", Compliance::NotApplicable)]);
        assert_eq!(only_na.score(), None);
    }

    #[test]
    fn test_deterministic_overview_mentions_flagged() {
        let verdicts = vec![verdict("1", Compliance::Yes), verdict("2", Compliance::No)];
        let tally = ComplianceTally::from_verdicts(&verdicts);
        let summaries = vec![heuristic_category_summary("Data", verdicts)];
        let overview = deterministic_overview(&tally, &summaries);
        assert!(overview.starts_with("2 checklist items assessed"));
        assert!(overview.contains("50%"));
        assert!(overview.contains("Categories needing attention: Data."));
    }

    #[test]
    fn test_sort_order() {
        let mut summaries = vec![
            default_category_summary("Zeta"),
            heuristic_category_summary("Beta", vec![verdict("1", Compliance::Partial)]),
            heuristic_category_summary("Gamma", vec![verdict("2", Compliance::No)]),
            default_category_summary("Alpha"),
            heuristic_category_summary("Delta", vec![verdict("3", Compliance::No)]),
        ];
        sort_summaries(&mut summaries);
        let order: Vec<&str> = summaries.iter().map(|s| s.category.as_str()).collect();
        assert_eq!(order, vec!["Delta", "Gamma", "Beta", "Alpha", "Zeta"]);
    }

    fn severity_strategy() -> impl Strategy<Value = Severity> {
        prop_oneof![Just(Severity::Low), Just(Severity::Medium), Just(Severity::High)]
    }

    proptest! {
        #[test]
        fn prop_sorted_by_rank_then_name(entries in proptest::collection::vec(("[A-Z][a-z]{0,6}", severity_strategy()), 0..20)) {
            let mut summaries: Vec<CategorySummary> = entries
                .into_iter()
                .map(|(name, severity)| CategorySummary {
                    category: name,
                    summary: String::new(),
                    severity,
                    member_verdicts: Vec::new(),
                })
                .collect();
            sort_summaries(&mut summaries);
            for pair in summaries.windows(2) {
                let key = |s: &CategorySummary| (s.severity.rank(), s.category.clone());
                prop_assert!(key(&pair[0]) <= key(&pair[1]));
            }
        }
    }
}
