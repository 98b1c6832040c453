//! Scripted provider for tests.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, TokenUsage};

/// One recorded call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl RecordedCall {
    pub fn user_prompt(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }
}

/// Returns queued results in order; an empty queue yields a service error.
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<CompletionResponse, ProviderError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, content: &str) -> Self {
        self.push(Ok(response(content, Some("stop"))))
    }

    pub fn truncated_reply(self, content: &str) -> Self {
        self.push(Ok(response(content, Some("length"))))
    }

    pub fn fail(self, error: ProviderError) -> Self {
        self.push(Err(error))
    }

    fn push(self, result: Result<CompletionResponse, ProviderError>) -> Self {
        self.script.lock().push_back(result);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

fn response(content: &str, stop_reason: Option<&str>) -> CompletionResponse {
    CompletionResponse {
        content: content.to_string(),
        usage: TokenUsage {
            prompt_tokens: 100,
            completion_tokens: 20,
        },
        model: "mock-model".to_string(),
        stop_reason: stop_reason.map(str::to_string),
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        self.calls.lock().push(RecordedCall {
            messages,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        });
        self.script.lock().pop_front().unwrap_or_else(|| {
            Err(ProviderError::ServiceError {
                status: 500,
                message: "script exhausted".to_string(),
            })
        })
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
