//! Bounded retries around operations that fail transiently.
//!
//! Every operation handed to [`RetryPolicy::run`] must be safe to repeat
//! (re-navigating, re-waiting, re-clicking); nothing is rolled back between
//! attempts.

use regscope_core::{BackoffKind, RetryConfig};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// All attempts failed; carries the last underlying error.
#[derive(Debug, Error)]
#[error("{operation} failed after {attempts} attempts: {cause}")]
pub struct ExhaustedRetries<E>
where
    E: std::error::Error + 'static,
{
    /// Label of the retried operation
    pub operation: String,
    /// Attempts made
    pub attempts: u32,
    /// Error of the final attempt
    #[source]
    pub cause: E,
}

/// Attempt budget and delay between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
    backoff: BackoffKind,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Fixed delay between at most `max_attempts` attempts (at least one).
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            backoff: BackoffKind::Fixed,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_millis(config.delay_ms))
            .with_backoff(config.backoff)
    }

    pub fn with_backoff(mut self, backoff: BackoffKind) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the `failed_attempt`-th failure (1-based).
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        match self.backoff {
            BackoffKind::Fixed => self.delay,
            BackoffKind::Linear => self.delay.saturating_mul(failed_attempt.max(1)),
        }
    }

    /// Run `op` until it succeeds or the budget is spent.
    pub async fn run<T, E, F, Fut>(
        &self,
        operation: &str,
        mut op: F,
    ) -> std::result::Result<T, ExhaustedRetries<E>>
    where
        E: std::error::Error + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= self.max_attempts => {
                    tracing::warn!(
                        operation,
                        attempts = attempt,
                        error = %e,
                        "retries exhausted"
                    );
                    return Err(ExhaustedRetries {
                        operation: operation.to_string(),
                        attempts: attempt,
                        cause: e,
                    });
                }
                Err(e) => {
                    let delay = self.delay_after(attempt);
                    tracing::debug!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "attempt failed, retrying in {:?}",
                        delay
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Error, PartialEq)]
    #[error("flaky failure #{0}")]
    struct Flaky(u32);

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let calls = AtomicU32::new(0);

        let result = policy
            .run("flaky op", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(Flaky(n))
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result.expect("third attempt succeeds"), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_carries_final_cause() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let calls = AtomicU32::new(0);

        let err = policy
            .run("always fails", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err::<(), _>(Flaky(n))
            })
            .await
            .unwrap_err();

        assert_eq!(err.attempts, 3);
        assert_eq!(err.cause, Flaky(3));
        assert_eq!(err.operation, "always fails");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_single_attempt_budget() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(policy.max_attempts(), 1);

        let err = policy
            .run("once", || async { Err::<(), _>(Flaky(1)) })
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 1);
    }

    #[tokio::test]
    async fn test_fixed_delay_is_applied() {
        let policy = RetryPolicy::new(2, Duration::from_millis(50));
        let started = std::time::Instant::now();
        let _ = policy
            .run("slow", || async { Err::<(), _>(Flaky(0)) })
            .await;
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_delay_shapes() {
        let fixed = RetryPolicy::new(5, Duration::from_millis(200));
        assert_eq!(fixed.delay_after(1), Duration::from_millis(200));
        assert_eq!(fixed.delay_after(4), Duration::from_millis(200));

        let linear = fixed.with_backoff(BackoffKind::Linear);
        assert_eq!(linear.delay_after(1), Duration::from_millis(200));
        assert_eq!(linear.delay_after(3), Duration::from_millis(600));
    }

    #[test]
    fn test_from_config() {
        let policy = RetryPolicy::from_config(&RetryConfig {
            max_attempts: 4,
            delay_ms: 250,
            backoff: BackoffKind::Linear,
        });
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.delay_after(2), Duration::from_millis(500));
    }
}
