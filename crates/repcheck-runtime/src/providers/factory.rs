//! Provider factory pattern for selecting a transport from configuration.
//!
//! ```ignore
//! let registry = ProviderRegistry::with_defaults();
//! let provider = registry.create(&config.provider)?;
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{LlmProvider, ProviderError};

/// Provider section of the runtime configuration.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderSettings {
    /// Registered provider type, e.g. "openai"
    pub kind: String,

    /// API key; falls back to the provider's environment variable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Custom API endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            kind: "openai".to_string(),
            api_key: None,
            base_url: None,
        }
    }
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("kind", &self.kind)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Factory for creating LLM providers from settings.
pub trait ProviderFactory: Send + Sync {
    /// Unique identifier for this provider type.
    fn provider_type(&self) -> &'static str;

    fn create(&self, settings: &ProviderSettings) -> Result<Arc<dyn LlmProvider>, ProviderError>;

    /// Validate settings without creating a provider.
    fn validate_settings(&self, settings: &ProviderSettings) -> Result<(), ProviderError>;

    fn description(&self) -> &'static str {
        "LLM Provider"
    }
}

/// Registry of available provider factories, keyed by type name.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<String, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider factory, replacing any with the same type.
    pub fn register(&mut self, factory: Arc<dyn ProviderFactory>) {
        self.factories
            .insert(factory.provider_type().to_string(), factory);
    }

    /// Validate and create the provider named by `settings.kind`.
    pub fn create(&self, settings: &ProviderSettings) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        let factory = self.factory(&settings.kind)?;
        factory.validate_settings(settings)?;
        factory.create(settings)
    }

    pub fn validate(&self, settings: &ProviderSettings) -> Result<(), ProviderError> {
        self.factory(&settings.kind)?.validate_settings(settings)
    }

    fn factory(&self, kind: &str) -> Result<&Arc<dyn ProviderFactory>, ProviderError> {
        self.factories.get(kind).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "Unknown provider type: '{}'. Available: {:?}",
                kind,
                self.available_types()
            ))
        })
    }

    pub fn available_types(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }

    pub fn has_provider(&self, provider_type: &str) -> bool {
        self.factories.contains_key(provider_type)
    }

    /// Registry with all compiled-in providers registered.
    #[cfg(feature = "openai")]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(super::OpenAiProviderFactory));
        registry
    }

    #[cfg(not(feature = "openai"))]
    pub fn with_defaults() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.available_types())
            .finish()
    }
}

/// Reject endpoints that are not http(s).
pub(crate) fn validate_base_url(base_url: Option<&str>) -> Result<(), ProviderError> {
    match base_url {
        Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => Err(
            ProviderError::NotConfigured("base_url must start with http:// or https://".to_string()),
        ),
        _ => Ok(()),
    }
}
