//! # repcheck-runtime
//!
//! LLM-assisted compliance analysis for repcheck.
//!
//! This crate drives the model calls that `repcheck-core` deliberately
//! avoids: one verdict per checklist item, then one summary per manuscript.
//!
//! ## Pipeline
//!
//! 1. [`ComplianceAnalyzer::analyze_manuscript`] judges each item against
//!    the manuscript text and persists the verdicts.
//! 2. [`SummarizeService::summarize`] groups those verdicts by category and
//!    persists the overview and category summaries.
//!
//! Every call goes through a shared [`ModelClient`], which applies the
//! throttle, the per-call timeout, usage accounting and the retry policy.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use repcheck_runtime::{ComplianceAnalyzer, ModelClient, MemoryStore, RuntimeConfig, SummarizeService};
//!
//! let config = RuntimeConfig::default();
//! let provider = registry.create(&config.provider)?;
//! let client = ModelClient::new(provider, &config);
//! let store = Arc::new(MemoryStore::new(checklist.clone()));
//!
//! let analyzer = ComplianceAnalyzer::new(client.clone(), store.clone(), &config);
//! let report = analyzer.analyze_manuscript(&manuscript, &text, checklist.items()).await?;
//!
//! let summarizer = SummarizeService::new(client, store, &config);
//! let summary = summarizer.summarize(&manuscript, &report.verdicts, checklist.items()).await?;
//! ```

pub mod analyzer;
pub mod client;
pub mod config;
pub mod extract;
pub mod metadata;
pub mod prompts;
pub mod providers;
pub mod resilience;
pub mod store;
pub mod summarizer;

pub use analyzer::{compliance_validator, AnalysisError, AnalysisReport, ComplianceAnalyzer};
pub use client::{AttemptError, ModelClient, ModelRequest};
pub use config::{AnalysisSettings, BudgetSettings, ConfigError, RuntimeConfig, SummarySettings};
pub use extract::{normalize_text, ExtractionError, PlainTextExtractor, TextExtractor};
pub use metadata::{ManuscriptMetadata, MetadataError, MetadataExtractor};
pub use providers::{
    ApiCredential, ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, ProviderFactory,
    ProviderRegistry, ProviderSettings, ResponseFormat, TokenUsage,
};
pub use resilience::{CallThrottle, LlmUsage, RetryPolicy, UsageTracker};
pub use store::{ComplianceStore, FileStore, MemoryStore, StoreError};
pub use summarizer::SummarizeService;

#[cfg(feature = "openai")]
pub use providers::{OpenAiProvider, OpenAiProviderFactory};
