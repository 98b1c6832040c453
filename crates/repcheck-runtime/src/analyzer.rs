//! Per-item compliance analysis.
//!
//! For each checklist item the manuscript text is tail-fitted to the input
//! budget, the model is asked for a four-field verdict at the configured
//! (zero) temperature, and the reply goes through the shared
//! [`ResponseValidator`]. A failed attempt, whether transport or validation,
//! is retried once after the backoff; a second failure becomes a
//! not-applicable fallback verdict. Items are processed sequentially in
//! checklist order. A successful verdict is persisted as soon as it exists;
//! a fallback is only reported, so it never replaces a stored verdict from
//! an earlier run.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use repcheck_core::{
    CharRatioEstimator, ChecklistItem, Compliance, ComplianceVerdict, EnumConstraint, Manuscript,
    ResponseSchema, ResponseValidator, TakeFrom, TextBudgetFitter, ValidatedRecord,
};

use crate::client::{AttemptError, ModelClient, ModelRequest};
use crate::config::{AnalysisSettings, BudgetSettings, RuntimeConfig};
use crate::prompts::{analysis_prompt, ANALYSIS_SYSTEM_PROMPT};
use crate::providers::ResponseFormat;
use crate::store::{ComplianceStore, StoreError};

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("no results: analysis failed for every checklist item")]
    NoResults,

    #[error("failed to persist verdict: {0}")]
    Store(#[from] StoreError),
}

/// Outcome of analyzing one manuscript.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub doi: String,

    /// One verdict per checklist item, fallbacks included, in checklist order
    pub verdicts: Vec<ComplianceVerdict>,

    /// Items whose verdict is a fallback
    pub failed_items: Vec<String>,
}

impl AnalysisReport {
    pub fn failure_count(&self) -> usize {
        self.failed_items.len()
    }

    pub fn success_count(&self) -> usize {
        self.verdicts.len() - self.failed_items.len()
    }
}

/// Validator for the four-field verdict reply.
pub fn compliance_validator() -> ResponseValidator {
    let canonical_na = Compliance::NotApplicable.as_str();
    let constraint = Compliance::NOT_APPLICABLE_ALIASES.iter().fold(
        EnumConstraint::new(Compliance::TOKENS, canonical_na),
        |constraint, alias| constraint.with_alias(*alias, canonical_na),
    );
    ResponseValidator::new(
        ResponseSchema::new(["compliance", "explanation", "quote", "section"])
            .with_enum("compliance", constraint),
    )
}

pub struct ComplianceAnalyzer {
    client: ModelClient,
    store: Arc<dyn ComplianceStore>,
    validator: ResponseValidator,
    fitter: TextBudgetFitter,
    budget: BudgetSettings,
    settings: AnalysisSettings,
}

impl ComplianceAnalyzer {
    pub fn new(client: ModelClient, store: Arc<dyn ComplianceStore>, config: &RuntimeConfig) -> Self {
        Self {
            client,
            store,
            validator: compliance_validator(),
            fitter: TextBudgetFitter::new(CharRatioEstimator::new(config.budget.chars_per_token)),
            budget: config.budget.clone(),
            settings: config.analysis.clone(),
        }
    }

    /// Analyze one item. Never fails: exhausted retries yield a fallback.
    pub async fn analyze_item(&self, doi: &str, manuscript_text: &str, item: &ChecklistItem) -> ComplianceVerdict {
        match self.try_analyze_item(doi, manuscript_text, item).await {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!(doi = %doi, item_id = %item.item_id, error = %e, "Item analysis failed, using fallback verdict");
                ComplianceVerdict::fallback(doi, item, &e)
            }
        }
    }

    /// Analyze every item in order, persisting each successful verdict as it
    /// is made. Fallbacks appear in the report but are not stored.
    ///
    /// Fails with [`AnalysisError::NoResults`] only when no item succeeded.
    pub async fn analyze_manuscript(
        &self,
        manuscript: &Manuscript,
        manuscript_text: &str,
        items: &[ChecklistItem],
    ) -> Result<AnalysisReport, AnalysisError> {
        let doi = manuscript.doi.as_str();
        let mut verdicts = Vec::with_capacity(items.len());
        let mut failed_items = Vec::new();

        tracing::info!(doi = %doi, items = items.len(), "Starting compliance analysis");

        for item in items {
            let verdict = match self.try_analyze_item(doi, manuscript_text, item).await {
                Ok(verdict) => {
                    self.store.upsert_verdict(&verdict).await?;
                    tracing::debug!(doi = %doi, item_id = %item.item_id, compliance = %verdict.compliance, "Stored verdict");
                    verdict
                }
                Err(e) => {
                    tracing::warn!(doi = %doi, item_id = %item.item_id, error = %e, "Item analysis failed, using fallback verdict");
                    failed_items.push(item.item_id.clone());
                    ComplianceVerdict::fallback(doi, item, &e)
                }
            };
            verdicts.push(verdict);
        }

        if failed_items.len() == items.len() {
            tracing::error!(doi = %doi, items = items.len(), "Every checklist item failed analysis");
            return Err(AnalysisError::NoResults);
        }

        if !failed_items.is_empty() {
            tracing::warn!(doi = %doi, failed = failed_items.len(), total = items.len(), "Analysis completed with failures");
        } else {
            tracing::info!(doi = %doi, total = items.len(), "Analysis completed");
        }

        Ok(AnalysisReport {
            doi: doi.to_string(),
            verdicts,
            failed_items,
        })
    }

    async fn try_analyze_item(
        &self,
        doi: &str,
        manuscript_text: &str,
        item: &ChecklistItem,
    ) -> Result<ComplianceVerdict, AttemptError> {
        let request = ModelRequest {
            system_prompt: ANALYSIS_SYSTEM_PROMPT.to_string(),
            prompt: analysis_prompt(item, &self.fit_text(manuscript_text, item)),
            temperature: self.settings.temperature,
            max_output_tokens: self.settings.max_output_tokens,
            response_format: ResponseFormat::JsonObject,
        };

        let label = format!("analyze item {}", item.item_id);
        let record = self
            .client
            .complete_with(&label, &request, |raw| self.validator.validate(raw))
            .await?;

        Ok(self.to_verdict(doi, item, record))
    }

    /// Tail-fit the text into what is left after the fixed prompt parts
    /// and the reserved output.
    fn fit_text(&self, manuscript_text: &str, item: &ChecklistItem) -> String {
        let overhead = self.fitter.estimate(ANALYSIS_SYSTEM_PROMPT) + self.fitter.estimate(&analysis_prompt(item, ""));
        let max_units = self.budget.input_budget(self.settings.max_output_tokens, overhead);
        self.fitter.fit(manuscript_text, max_units, TakeFrom::Tail)
    }

    fn to_verdict(&self, doi: &str, item: &ChecklistItem, record: ValidatedRecord) -> ComplianceVerdict {
        let compliance = record
            .get_str("compliance")
            .parse::<Compliance>()
            .unwrap_or(Compliance::NotApplicable);

        let mut explanation = record.get_str("explanation").to_string();
        if !record.notes().is_empty() {
            explanation = format!("{} (note: {})", explanation, record.notes().join("; "))
                .trim()
                .to_string();
        }

        ComplianceVerdict {
            doi: doi.to_string(),
            item_id: item.item_id.clone(),
            question: item.question.clone(),
            compliance,
            explanation,
            quote: record.get_str("quote").to_string(),
            section: record.get_str("section").to_string(),
            created_at: Utc::now(),
        }
    }
}
