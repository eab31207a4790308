//! Fixed-budget retry for remote calls.
//!
//! The policy knows nothing about HTTP. Callers decide whether an operation
//! is safe to repeat.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::DEFAULT_MAX_ATTEMPTS;

/// Retry budget applied uniformly to every network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, first try included. Never less than one.
    pub max_attempts: u32,
    /// Pause between attempts in milliseconds.
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay_ms: 0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay_ms: 0,
        }
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Run `operation` until it succeeds or the budget is spent.
    ///
    /// The error of the last attempt is returned unchanged.
    pub async fn invoke<T, E, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if attempt < max_attempts => {
                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        error = %err,
                        "Attempt failed, retrying"
                    );
                    if self.delay_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
                    }
                    attempt += 1;
                }
                Err(err) => {
                    warn!(operation, attempts = attempt, error = %err, "Retry budget exhausted");
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_default_budget() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay_ms, 0);
    }

    #[test]
    fn test_zero_budget_still_tries_once() {
        assert_eq!(RetryPolicy::new(0).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let counter = AtomicU32::new(0);
        let result: Result<u32, String> = RetryPolicy::default()
            .invoke("op", || async {
                counter.fetch_add(1, Ordering::Relaxed);
                Ok(7)
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let counter = Arc::new(AtomicU32::new(0));
        let result: Result<&str, String> = RetryPolicy::default()
            .invoke("op", || {
                let c = counter.clone();
                async move {
                    if c.fetch_add(1, Ordering::Relaxed) < 2 {
                        Err("not yet".to_string())
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(counter.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_exhausted_budget_returns_last_error() {
        let counter = Arc::new(AtomicU32::new(0));
        let result: Result<(), String> = RetryPolicy::new(5)
            .invoke("op", || {
                let c = counter.clone();
                async move {
                    let n = c.fetch_add(1, Ordering::Relaxed) + 1;
                    Err(format!("failure {}", n))
                }
            })
            .await;
        assert_eq!(result.unwrap_err(), "failure 5");
        assert_eq!(counter.load(Ordering::Relaxed), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_between_attempts() {
        let start = tokio::time::Instant::now();
        let result: Result<(), String> = RetryPolicy::new(3)
            .with_delay_ms(100)
            .invoke("op", || async { Err("down".to_string()) })
            .await;
        assert!(result.is_err());
        assert!(start.elapsed() >= Duration::from_millis(200));
    }
}
