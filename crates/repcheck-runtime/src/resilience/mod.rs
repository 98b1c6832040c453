//! Resilience patterns for repcheck-runtime.
//!
//! This module provides:
//! - Fixed-backoff retry
//! - A cooperative delay between model calls
//! - Token and cost accounting

mod retry;
mod throttle;
mod usage;

pub use retry::RetryPolicy;
pub use throttle::CallThrottle;
pub use usage::{LlmUsage, UsageTracker};
