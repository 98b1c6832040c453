//! Runtime configuration.
//!
//! Loaded from YAML; every field has a default so a partial file (or no
//! file) is valid:
//!
//! ```yaml
//! provider:
//!   kind: openai
//! model: gpt-4o
//! analysis:
//!   temperature: 0.0
//!   max_output_tokens: 2000
//! retry:
//!   backoff: 5s
//!   max_retries: 1
//! call_delay: 1s
//! request_timeout: 60s
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::providers::ProviderSettings;
use crate::resilience::RetryPolicy;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub provider: ProviderSettings,

    /// Model used for every call
    pub model: String,

    pub analysis: AnalysisSettings,
    pub summary: SummarySettings,
    pub budget: BudgetSettings,
    pub retry: RetryPolicy,

    /// Minimum gap between successive model calls
    #[serde(with = "humantime_duration")]
    pub call_delay: Duration,

    /// Upper bound on a single model call
    #[serde(with = "humantime_duration")]
    pub request_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            provider: ProviderSettings::default(),
            model: "gpt-4o".to_string(),
            analysis: AnalysisSettings::default(),
            summary: SummarySettings::default(),
            budget: BudgetSettings::default(),
            retry: RetryPolicy::default(),
            call_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl RuntimeConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".to_string()));
        }
        if self.budget.chars_per_token == 0 {
            return Err(ConfigError::Invalid("budget.chars_per_token must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.budget.metadata_fraction) {
            return Err(ConfigError::Invalid(
                "budget.metadata_fraction must be between 0 and 1".to_string(),
            ));
        }
        if self.budget.max_input_tokens > self.budget.context_window {
            return Err(ConfigError::Invalid(
                "budget.max_input_tokens exceeds budget.context_window".to_string(),
            ));
        }
        for (name, t) in [
            ("analysis.temperature", self.analysis.temperature),
            ("summary.overview_temperature", self.summary.overview_temperature),
            ("summary.categories_temperature", self.summary.categories_temperature),
        ] {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::Invalid(format!("{name} must be between 0 and 2")));
            }
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid("request_timeout must be positive".to_string()));
        }
        Ok(())
    }
}

/// Per-item compliance analysis call settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_output_tokens: 2000,
        }
    }
}

/// Summarization call settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarySettings {
    pub overview_temperature: f32,
    pub categories_temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for SummarySettings {
    fn default() -> Self {
        Self {
            overview_temperature: 0.3,
            categories_temperature: 0.0,
            max_output_tokens: 1000,
        }
    }
}

/// Model input limits, in tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetSettings {
    pub context_window: usize,
    pub max_input_tokens: usize,
    pub chars_per_token: usize,

    /// Share of `max_input_tokens` given to metadata extraction
    pub metadata_fraction: f64,
}

impl Default for BudgetSettings {
    fn default() -> Self {
        Self {
            context_window: 128_000,
            max_input_tokens: 100_000,
            chars_per_token: 4,
            metadata_fraction: 0.25,
        }
    }
}

impl BudgetSettings {
    /// Tokens of manuscript text allowed in a prompt whose fixed parts
    /// cost `overhead_tokens` and whose reply may use `max_output_tokens`.
    pub fn input_budget(&self, max_output_tokens: u32, overhead_tokens: usize) -> usize {
        self.context_window
            .saturating_sub(max_output_tokens as usize)
            .saturating_sub(overhead_tokens)
            .min(self.max_input_tokens)
    }

    pub fn metadata_budget(&self) -> usize {
        (self.max_input_tokens as f64 * self.metadata_fraction) as usize
    }
}

/// Serde adapter for human-readable durations ("5s", "250ms").
pub mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
