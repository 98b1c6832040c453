//! Fixed-backoff retry for model calls.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use backon::{ConstantBuilder, Retryable};
use serde::{Deserialize, Serialize};

use crate::config::humantime_duration;

/// Retry policy: a constant delay and a bounded number of retries.
///
/// `max_retries = 1` means at most two attempts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    #[serde(with = "humantime_duration")]
    pub backoff: Duration,

    pub max_retries: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff: Duration::from_secs(5),
            max_retries: 1,
        }
    }
}

impl RetryPolicy {
    pub fn new(backoff: Duration, max_retries: usize) -> Self {
        Self { backoff, max_retries }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self::new(Duration::ZERO, 0)
    }

    fn backoff_builder(&self) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(self.backoff)
            .with_max_times(self.max_retries)
    }

    /// Run `operation`, retrying every error after the fixed backoff.
    ///
    /// The last error is returned once retries are exhausted.
    pub async fn run<T, E, F, Fut>(&self, label: &str, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        operation
            .retry(self.backoff_builder())
            .sleep(tokio::time::sleep)
            .notify(|err: &E, delay: Duration| {
                tracing::warn!(
                    operation = label,
                    error = %err,
                    delay = ?delay,
                    "Attempt failed, retrying after backoff"
                );
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_retries_exactly_once() {
        let attempts = AtomicUsize::new(0);
        let attempts_ref = &attempts;
        let result: Result<(), String> = RetryPolicy::default()
            .run("test", || async move {
                attempts_ref.fetch_add(1, Ordering::SeqCst);
                Err("boom".to_string())
            })
            .await;

        assert_eq!(result, Err("boom".to_string()));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_one_failure() {
        let attempts = AtomicUsize::new(0);
        let attempts_ref = &attempts;
        let start = tokio::time::Instant::now();
        let result: Result<usize, String> = RetryPolicy::default()
            .run("test", || async move {
                let n = attempts_ref.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err("first".to_string())
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result, Ok(1));
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_no_retry_policy() {
        let attempts = AtomicUsize::new(0);
        let attempts_ref = &attempts;
        let _: Result<(), &str> = RetryPolicy::none()
            .run("test", || async move {
                attempts_ref.fetch_add(1, Ordering::SeqCst);
                Err("nope")
            })
            .await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
