//! Cooperative spacing between successive model calls.
//!
//! This is a minimum gap, not a concurrency limit: each caller waits until
//! `delay` has passed since the previous call started.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
pub struct CallThrottle {
    delay: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl CallThrottle {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_call: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Wait for the gap to elapse, then mark a new call as started.
    pub async fn wait(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.delay {
                let remaining = self.delay - elapsed;
                tracing::trace!(wait = ?remaining, "Throttling model call");
                tokio::time::sleep(remaining).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}

impl Default for CallThrottle {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_call_does_not_wait() {
        let throttle = CallThrottle::new(Duration::from_secs(1));
        let start = Instant::now();
        throttle.wait().await;
        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_successive_calls_are_spaced() {
        let throttle = CallThrottle::new(Duration::from_secs(1));
        let start = Instant::now();
        throttle.wait().await;
        throttle.wait().await;
        throttle.wait().await;
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_gap_is_not_repeated() {
        let throttle = CallThrottle::new(Duration::from_secs(1));
        throttle.wait().await;
        tokio::time::sleep(Duration::from_secs(3)).await;
        let start = Instant::now();
        throttle.wait().await;
        assert!(start.elapsed() < Duration::from_millis(10));
    }
}
