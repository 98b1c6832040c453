//! Manuscript-level summarization.
//!
//! Two model calls per manuscript: a prose overview and one batched request
//! for every category's summary and severity. Neither can fail the
//! summary. An unusable overview falls back to a sentence built from the
//! tally, and any category without a usable entry takes the deterministic
//! severity heuristic.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};

use repcheck_core::{
    default_category_summary, deterministic_overview, group_by_category, heuristic_category_summary,
    parse_object, sort_summaries, AnalysisSummary, CategorySummary, ChecklistItem, ComplianceTally,
    ComplianceVerdict, Manuscript, Severity,
};

use crate::client::{ModelClient, ModelRequest};
use crate::config::{RuntimeConfig, SummarySettings};
use crate::prompts::{
    categories_prompt, format_verdicts, overview_prompt, CATEGORIES_SYSTEM_PROMPT, OVERVIEW_SYSTEM_PROMPT,
};
use crate::providers::ResponseFormat;
use crate::store::{ComplianceStore, StoreError};

pub struct SummarizeService {
    client: ModelClient,
    store: Arc<dyn ComplianceStore>,
    settings: SummarySettings,
}

impl SummarizeService {
    pub fn new(client: ModelClient, store: Arc<dyn ComplianceStore>, config: &RuntimeConfig) -> Self {
        Self {
            client,
            store,
            settings: config.summary.clone(),
        }
    }

    /// Build and persist the summary for one manuscript.
    ///
    /// Only a persistence failure is returned as an error.
    pub async fn summarize(
        &self,
        manuscript: &Manuscript,
        verdicts: &[ComplianceVerdict],
        items: &[ChecklistItem],
    ) -> Result<AnalysisSummary, StoreError> {
        let doi = manuscript.doi.as_str();
        let groups = group_by_category(verdicts, items);
        let formatted = format_verdicts(&groups);
        let info = manuscript.describe();

        tracing::info!(doi = %doi, verdicts = verdicts.len(), categories = groups.len(), "Summarizing analysis");

        let entries = if verdicts.is_empty() {
            None
        } else {
            self.request_categories(doi, &info, &formatted, &groups).await
        };
        let mut category_summaries = build_category_summaries(groups, entries.as_ref());
        sort_summaries(&mut category_summaries);

        let overview = match self.request_overview(doi, &info, &formatted, verdicts).await {
            Some(overview) => overview,
            None => deterministic_overview(&ComplianceTally::from_verdicts(verdicts), &category_summaries),
        };

        let summary = AnalysisSummary {
            doi: doi.to_string(),
            overview,
            category_summaries,
            created_at: Utc::now(),
        };
        self.store.upsert_summary(&summary).await?;
        tracing::info!(doi = %doi, categories = summary.category_summaries.len(), "Stored analysis summary");

        Ok(summary)
    }

    async fn request_overview(
        &self,
        doi: &str,
        info: &str,
        formatted: &str,
        verdicts: &[ComplianceVerdict],
    ) -> Option<String> {
        if verdicts.is_empty() {
            return None;
        }

        let request = ModelRequest {
            system_prompt: OVERVIEW_SYSTEM_PROMPT.to_string(),
            prompt: overview_prompt(info, formatted),
            temperature: self.settings.overview_temperature,
            max_output_tokens: self.settings.max_output_tokens,
            response_format: ResponseFormat::Text,
        };

        match self.client.complete_text("summary overview", &request).await {
            Ok(text) if !text.is_empty() => Some(text),
            Ok(_) => {
                tracing::warn!(doi = %doi, "Model returned an empty overview, using tally overview");
                None
            }
            Err(e) => {
                tracing::warn!(doi = %doi, error = %e, "Overview generation failed, using tally overview");
                None
            }
        }
    }

    /// One batched call for all categories. `None` means the reply was unusable.
    async fn request_categories(
        &self,
        doi: &str,
        info: &str,
        formatted: &str,
        groups: &BTreeMap<String, Vec<ComplianceVerdict>>,
    ) -> Option<Map<String, Value>> {
        let categories: Vec<String> = groups
            .iter()
            .filter(|(_, members)| !members.is_empty())
            .map(|(category, _)| category.clone())
            .collect();

        let request = ModelRequest {
            system_prompt: CATEGORIES_SYSTEM_PROMPT.to_string(),
            prompt: categories_prompt(info, formatted, &categories),
            temperature: self.settings.categories_temperature,
            max_output_tokens: self.settings.max_output_tokens,
            response_format: ResponseFormat::JsonObject,
        };

        match self.client.complete_with("category summaries", &request, parse_object).await {
            Ok(object) => Some(unwrap_categories(object)),
            Err(e) => {
                tracing::warn!(doi = %doi, error = %e, "Category summaries unusable, using severity heuristic");
                None
            }
        }
    }
}

/// Accept both `{"categories": {...}}` and a bare category map.
fn unwrap_categories(mut object: Map<String, Value>) -> Map<String, Value> {
    match object.remove("categories") {
        Some(Value::Object(inner)) => inner,
        Some(other) => {
            object.insert("categories".to_string(), other);
            object
        }
        None => object,
    }
}

/// Summary and severity for one category, if the entry is well formed.
fn parse_entry(entries: &Map<String, Value>, category: &str) -> Option<(String, Severity)> {
    let entry = entries.get(category).or_else(|| {
        entries
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(category))
            .map(|(_, value)| value)
    })?;

    let summary = entry.get("summary")?.as_str()?.trim();
    let severity = entry.get("severity")?.as_str()?.parse::<Severity>().ok()?;
    if summary.is_empty() {
        return None;
    }
    Some((summary.to_string(), severity))
}

fn build_category_summaries(
    groups: BTreeMap<String, Vec<ComplianceVerdict>>,
    entries: Option<&Map<String, Value>>,
) -> Vec<CategorySummary> {
    groups
        .into_iter()
        .map(|(category, members)| {
            if members.is_empty() {
                return default_category_summary(category);
            }
            match entries.and_then(|entries| parse_entry(entries, &category)) {
                Some((summary, severity)) => CategorySummary {
                    category,
                    summary,
                    severity,
                    member_verdicts: members,
                },
                None => {
                    tracing::debug!(category = %category, "No usable model entry, using severity heuristic");
                    heuristic_category_summary(category, members)
                }
            }
        })
        .collect()
}
