//! A provider handle with the per-call policies every stage shares.
//!
//! Each attempt goes through the throttle, is bounded by a timeout and has
//! its usage recorded. Validation of the reply happens inside the retried
//! attempt, so a malformed reply is retried the same way a transport
//! failure is.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use repcheck_core::ValidationError;

use crate::config::RuntimeConfig;
use crate::providers::{ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, ResponseFormat};
use crate::resilience::{CallThrottle, RetryPolicy, UsageTracker};

/// Why a single attempt failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AttemptError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("invalid response: {0}")]
    Validation(#[from] ValidationError),
}

/// One model request.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system_prompt: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub response_format: ResponseFormat,
}

#[derive(Clone)]
pub struct ModelClient {
    provider: Arc<dyn LlmProvider>,
    model: String,
    timeout: Duration,
    retry: RetryPolicy,
    throttle: Arc<CallThrottle>,
    usage: UsageTracker,
}

impl std::fmt::Debug for ModelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelClient")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("call_delay", &self.throttle.delay())
            .finish()
    }
}

impl ModelClient {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &RuntimeConfig) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            timeout: config.request_timeout,
            retry: config.retry,
            throttle: Arc::new(CallThrottle::new(config.call_delay)),
            usage: UsageTracker::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    /// Single attempt: throttle, bounded call, usage accounting.
    pub async fn complete_once(&self, request: &ModelRequest) -> Result<CompletionResponse, ProviderError> {
        self.throttle.wait().await;

        let messages = vec![
            ChatMessage::system(request.system_prompt.clone()),
            ChatMessage::user(request.prompt.clone()),
        ];
        let config = CompletionConfig {
            model: self.model.clone(),
            max_tokens: request.max_output_tokens,
            temperature: request.temperature,
            timeout: self.timeout,
            response_format: request.response_format,
        };

        let response = match tokio::time::timeout(self.timeout, self.provider.complete(messages, &config)).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, provider = self.provider.name(), "Model call timed out");
                return Err(ProviderError::Timeout(self.timeout));
            }
        };

        self.usage.record(&response.usage, &response.model);

        if response.is_truncated() {
            tracing::warn!(
                stop_reason = response.stop_reason.as_deref().unwrap_or_default(),
                max_tokens = request.max_output_tokens,
                "Model output was cut off at the token limit"
            );
        }

        Ok(response)
    }

    /// Call and parse with the retry policy applied to both steps.
    pub async fn complete_with<T, P>(&self, label: &str, request: &ModelRequest, parse: P) -> Result<T, AttemptError>
    where
        P: Fn(&str) -> Result<T, ValidationError>,
    {
        let parse = &parse;
        self.retry
            .run(label, || async move {
                let response = self.complete_once(request).await?;
                Ok::<T, AttemptError>(parse(&response.content)?)
            })
            .await
    }

    /// Call with retry and return the raw text.
    pub async fn complete_text(&self, label: &str, request: &ModelRequest) -> Result<String, AttemptError> {
        self.complete_with(label, request, |raw| Ok(raw.trim().to_string())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::ScriptedProvider;
    use async_trait::async_trait;

    fn request() -> ModelRequest {
        ModelRequest {
            system_prompt: "sys".to_string(),
            prompt: "hello".to_string(),
            temperature: 0.0,
            max_output_tokens: 50,
            response_format: ResponseFormat::Text,
        }
    }

    struct HangingProvider;

    #[async_trait]
    impl LlmProvider for HangingProvider {
        async fn complete(
            &self,
            _messages: Vec<ChatMessage>,
            _config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            std::future::pending().await
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "hanging"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_call_becomes_timeout() {
        let config = RuntimeConfig::default();
        let client = ModelClient::new(Arc::new(HangingProvider), &config).with_retry(RetryPolicy::none());
        let err = client.complete_once(&request()).await.unwrap_err();
        assert_eq!(err, ProviderError::Timeout(config.request_timeout));
    }

    #[test]
    fn test_debug_shows_call_policy() {
        let mut config = RuntimeConfig::default();
        config.call_delay = Duration::from_millis(250);
        let client = ModelClient::new(Arc::new(HangingProvider), &config);
        let rendered = format!("{client:?}");
        assert!(rendered.contains("hanging"));
        assert!(rendered.contains("gpt-4o"));
        assert!(rendered.contains("call_delay: 250ms"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_throttle_and_usage() {
        let provider = Arc::new(ScriptedProvider::new().reply("a").reply("b"));
        let config = RuntimeConfig::default();
        let client = ModelClient::new(provider, &config);
        let other = client.clone();

        let start = tokio::time::Instant::now();
        client.complete_text("t", &request()).await.unwrap();
        other.complete_text("t", &request()).await.unwrap();

        assert!(start.elapsed() >= config.call_delay);
        assert_eq!(client.usage().snapshot().llm_calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_usage_recorded_per_response() {
        let provider = Arc::new(ScriptedProvider::new().reply("a").reply("b"));
        let client = ModelClient::new(provider, &RuntimeConfig::default());
        client.complete_text("t", &request()).await.unwrap();
        client.complete_text("t", &request()).await.unwrap();
        let usage = client.usage().snapshot();
        assert_eq!(usage.llm_calls, 2);
        assert_eq!(usage.prompt_tokens, 200);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parse_failure_is_retried() {
        let provider = Arc::new(ScriptedProvider::new().reply("not json").reply("{\"ok\": 1}"));
        let client = ModelClient::new(provider.clone(), &RuntimeConfig::default());
        let value = client
            .complete_with("t", &request(), repcheck_core::parse_object)
            .await
            .unwrap();
        assert_eq!(value["ok"], 1);
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_one_retry() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .fail(ProviderError::RateLimited { retry_after: None })
                .fail(ProviderError::Timeout(Duration::from_secs(1)))
                .reply("never reached"),
        );
        let client = ModelClient::new(provider.clone(), &RuntimeConfig::default());
        let err = client.complete_text("t", &request()).await.unwrap_err();
        assert_eq!(err, AttemptError::Provider(ProviderError::Timeout(Duration::from_secs(1))));
        assert_eq!(provider.call_count(), 2);
    }
}
