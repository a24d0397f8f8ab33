//! Bounded retry with exponential backoff.
//!
//! One policy value is applied uniformly to connection establishment and
//! request/reply. Attempts are counted from 1; after failed attempt `n` the
//! policy sleeps `base_delay * 2^n` before attempt `n + 1`. There is no sleep
//! after the final attempt.

use std::future::Future;
use std::time::Duration;

/// Outcome of an operation the policy gave up on.
#[derive(Debug)]
pub struct RetryFailure<E> {
    /// Number of attempts made, including the failing one.
    pub attempts: u32,

    /// The error returned by the last attempt.
    pub error: E,

    /// True when every allowed attempt failed; false when the error was not retryable.
    pub exhausted: bool,
}

/// Retry policy: maximum attempts and an exponential backoff base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// Attempts made by the default policy.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    /// Creates a policy. `max_attempts` is clamped to at least 1.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Returns the maximum number of attempts.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the backoff base.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Delay to wait after failed attempt `attempt` (counted from 1).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Total backoff slept when the first `attempts` attempts are needed.
    pub fn total_backoff(&self, attempts: u32) -> Duration {
        (1..attempts.min(self.max_attempts))
            .map(|attempt| self.delay_for(attempt))
            .sum()
    }

    /// Runs `op` until it succeeds or the attempts are exhausted, retrying every error.
    pub async fn execute<T, E, F, Fut>(
        &self,
        operation: &str,
        op: F,
    ) -> Result<T, RetryFailure<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.execute_when(operation, |_| true, op).await
    }

    /// Runs `op`, retrying only errors for which `is_retryable` returns true.
    ///
    /// `op` receives the attempt number (from 1).
    pub async fn execute_when<T, E, P, F, Fut>(
        &self,
        operation: &str,
        is_retryable: P,
        mut op: F,
    ) -> Result<T, RetryFailure<E>>
    where
        P: Fn(&E) -> bool,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) if !is_retryable(&error) => {
                    return Err(RetryFailure {
                        attempts: attempt,
                        error,
                        exhausted: false,
                    });
                }
                Err(error) if attempt >= self.max_attempts => {
                    tracing::error!(
                        operation,
                        attempt,
                        error = %error,
                        "giving up after final attempt"
                    );
                    return Err(RetryFailure {
                        attempts: attempt,
                        error,
                        exhausted: true,
                    });
                }
                Err(error) => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        operation,
                        attempt,
                        delay_secs = delay.as_secs_f64(),
                        error = %error,
                        "attempt failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS, Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[test]
    fn default_policy_is_three_attempts_with_power_of_two_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
    }

    #[test]
    fn total_backoff_sums_delays_between_attempts() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.total_backoff(1), Duration::ZERO);
        assert_eq!(policy.total_backoff(2), Duration::from_secs(2));
        assert_eq!(policy.total_backoff(3), Duration::from_secs(6));
        // capped at max attempts
        assert_eq!(policy.total_backoff(10), Duration::from_secs(6));
    }

    #[test]
    fn max_attempts_is_at_least_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt_after_backoff() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result: Result<u32, RetryFailure<String>> = policy
            .execute("test", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(format!("attempt {attempt} failed"))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_without_sleeping_after_last_attempt() {
        let policy = RetryPolicy::default();
        let started = Instant::now();

        let failure = policy
            .execute("test", |_| async { Err::<(), _>("down") })
            .await
            .unwrap_err();

        assert_eq!(failure.attempts, 3);
        assert!(failure.exhausted);
        assert_eq!(failure.error, "down");
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(6));
        assert!(elapsed < Duration::from_secs(14));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_surfaces_immediately() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);

        let failure = policy
            .execute_when(
                "test",
                |e: &&str| *e == "transient",
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>("fatal") }
                },
            )
            .await
            .unwrap_err();

        assert_eq!(failure.attempts, 1);
        assert!(!failure.exhausted);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
