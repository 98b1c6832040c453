//! Manuscript metadata extraction from front matter.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use repcheck_core::{CharRatioEstimator, Manuscript, ResponseSchema, ResponseValidator, TakeFrom, TextBudgetFitter, ValidationError};

use crate::client::{AttemptError, ModelClient, ModelRequest};
use crate::config::{BudgetSettings, RuntimeConfig};
use crate::prompts::{metadata_prompt, METADATA_SYSTEM_PROMPT};
use crate::providers::ResponseFormat;

const METADATA_SCHEMA_JSON: &str = include_str!("../../../schema/manuscript_metadata.schema.json");

const METADATA_TEMPERATURE: f32 = 0.1;
const METADATA_MAX_OUTPUT_TOKENS: u32 = 1000;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("metadata schema failed to load: {0}")]
    SchemaLoad(String),

    #[error("metadata extraction failed: {0}")]
    Call(#[from] AttemptError),

    #[error("metadata response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Bibliographic fields read from the start of a manuscript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManuscriptMetadata {
    pub title: String,
    pub authors: Vec<String>,

    #[serde(default)]
    pub doi: Option<String>,

    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,

    #[serde(default)]
    pub design: Option<String>,
}

impl ManuscriptMetadata {
    /// Build a manuscript record, preferring the printed DOI over `fallback_doi`.
    pub fn into_manuscript(self, fallback_doi: Option<&str>) -> Manuscript {
        let doi = self
            .doi
            .filter(|d| !d.trim().is_empty())
            .or_else(|| fallback_doi.map(str::to_string))
            .unwrap_or_default();

        Manuscript {
            doi,
            title: self.title,
            authors: self.authors,
            abstract_text: self.abstract_text.unwrap_or_default(),
            design: self.design.unwrap_or_default(),
        }
    }
}

pub struct MetadataExtractor {
    client: ModelClient,
    validator: ResponseValidator,
    fitter: TextBudgetFitter,
    budget: BudgetSettings,
}

impl MetadataExtractor {
    pub fn new(client: ModelClient, config: &RuntimeConfig) -> Result<Self, MetadataError> {
        let document: serde_json::Value =
            serde_json::from_str(METADATA_SCHEMA_JSON).map_err(|e| MetadataError::SchemaLoad(e.to_string()))?;
        let validator = ResponseValidator::new(ResponseSchema::new(["title", "authors"]))
            .with_json_schema(&document)
            .map_err(|e: ValidationError| MetadataError::SchemaLoad(e.to_string()))?;

        Ok(Self {
            client,
            validator,
            fitter: TextBudgetFitter::new(CharRatioEstimator::new(config.budget.chars_per_token)),
            budget: config.budget.clone(),
        })
    }

    /// Extract metadata from the head of `text`.
    pub async fn extract(&self, text: &str) -> Result<ManuscriptMetadata, MetadataError> {
        let front_matter = self.fitter.fit(text, self.budget.metadata_budget(), TakeFrom::Head);
        let request = ModelRequest {
            system_prompt: METADATA_SYSTEM_PROMPT.to_string(),
            prompt: metadata_prompt(&front_matter),
            temperature: METADATA_TEMPERATURE,
            max_output_tokens: METADATA_MAX_OUTPUT_TOKENS,
            response_format: ResponseFormat::JsonObject,
        };

        let record = self
            .client
            .complete_with("extract metadata", &request, |raw| self.validator.validate(raw))
            .await?;
        let metadata: ManuscriptMetadata = serde_json::from_value(record.into_value())?;

        tracing::info!(title = %metadata.title, authors = metadata.authors.len(), "Extracted manuscript metadata");
        Ok(metadata)
    }
}
