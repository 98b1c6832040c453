//! Token and cost accounting across a run.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::providers::TokenUsage;

/// Accumulated LLM usage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmUsage {
    pub total_tokens: u32,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,

    /// Number of LLM calls that returned a response
    pub llm_calls: u32,

    /// Estimated cost in USD
    pub estimated_cost: f64,
}

impl LlmUsage {
    /// Add token usage from a provider response.
    pub fn add(&mut self, usage: &TokenUsage, model: &str) {
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
        self.total_tokens += usage.total();
        self.llm_calls += 1;
        self.estimated_cost += Self::estimate_cost(usage, model);
    }

    fn estimate_cost(usage: &TokenUsage, model: &str) -> f64 {
        // USD per million tokens
        let (input_rate, output_rate) = match model {
            m if m.contains("gpt-4o-mini") => (0.15, 0.6),
            m if m.contains("gpt-4o") => (2.5, 10.0),
            m if m.contains("gpt-4.1-mini") => (0.4, 1.6),
            m if m.contains("gpt-4.1") => (2.0, 8.0),
            m if m.contains("gpt-4-turbo") => (10.0, 30.0),
            _ => (2.5, 10.0),
        };

        let input_cost = (usage.prompt_tokens as f64 / 1_000_000.0) * input_rate;
        let output_cost = (usage.completion_tokens as f64 / 1_000_000.0) * output_rate;
        input_cost + output_cost
    }
}

/// Shared usage accumulator; clones share the same totals.
#[derive(Debug, Clone, Default)]
pub struct UsageTracker {
    usage: Arc<RwLock<LlmUsage>>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, usage: &TokenUsage, model: &str) {
        self.usage.write().add(usage, model);
    }

    pub fn snapshot(&self) -> LlmUsage {
        self.usage.read().clone()
    }

    pub fn reset(&self) {
        *self.usage.write() = LlmUsage::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_estimation() {
        let mut usage = LlmUsage::default();
        usage.add(
            &TokenUsage {
                prompt_tokens: 1000,
                completion_tokens: 500,
            },
            "gpt-4o",
        );

        // 1000 * $2.5/MTok + 500 * $10/MTok = $0.0075
        assert!(usage.estimated_cost > 0.007 && usage.estimated_cost < 0.008);
        assert_eq!(usage.total_tokens, 1500);
        assert_eq!(usage.llm_calls, 1);
    }

    #[test]
    fn test_tracker_clones_share_totals() {
        let tracker = UsageTracker::new();
        let other = tracker.clone();
        other.record(
            &TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
            },
            "gpt-4o-mini",
        );
        assert_eq!(tracker.snapshot().total_tokens, 15);

        tracker.reset();
        assert_eq!(other.snapshot(), LlmUsage::default());
    }
}
