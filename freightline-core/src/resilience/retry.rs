//! Bounded retry with exponential backoff
//!
//! Attempt 1 runs immediately; after a failed attempt `n` the executor sleeps
//! `base_delay * 2^(n-1)` before the next one. Delays come from `backon`'s
//! exponential builder (factor 2, no jitter). Every attempt is bounded by a
//! timeout, and a timed-out attempt counts as a failure.
//!
//! The executor knows nothing about caches or circuit breakers.

use backon::{BackoffBuilder, ExponentialBuilder};
use std::future::Future;
use std::time::Duration;

use crate::config::DependencyPolicy;
use crate::metrics::resilience::DOWNSTREAM_RETRIES;

/// Why a single attempt failed
#[derive(Debug, thiserror::Error)]
pub enum AttemptError<E> {
    #[error("attempt timed out after {0:?}")]
    TimedOut(Duration),
    #[error(transparent)]
    Failed(E),
}

/// Returned once the last attempt has failed
#[derive(Debug, thiserror::Error)]
#[error("{operation} failed after {attempts} attempt(s): {last_error}")]
pub struct RetryExhausted<E> {
    pub operation: String,
    pub attempts: u32,
    #[source]
    pub last_error: AttemptError<E>,
}

/// One scheduled attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryAttempt {
    /// 1-based
    pub attempt_number: u32,
    /// Zero for the first attempt
    pub delay_before_attempt: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn from_dependency(policy: &DependencyPolicy) -> Self {
        Self {
            max_attempts: policy.max_attempts,
            base_delay: policy.base_delay(),
            attempt_timeout: policy.attempt_timeout(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_dependency(&DependencyPolicy::default())
    }
}

#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// `max_attempts` below 1 is raised to 1
    #[must_use]
    pub fn new(mut policy: RetryPolicy) -> Self {
        policy.max_attempts = policy.max_attempts.max(1);
        Self { policy }
    }

    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Attempts with the delay preceding each one
    pub fn schedule(&self) -> impl Iterator<Item = RetryAttempt> {
        std::iter::once(Duration::ZERO)
            .chain(self.backoff())
            .zip(1..=self.policy.max_attempts)
            .map(|(delay_before_attempt, attempt_number)| RetryAttempt {
                attempt_number,
                delay_before_attempt,
            })
    }

    /// Run `operation` until it succeeds or the attempts run out.
    ///
    /// The last failure is returned, never swallowed. Sleeping only suspends
    /// the calling task.
    pub async fn execute<T, E, F, Fut>(
        &self,
        operation: &str,
        mut op: F,
    ) -> Result<T, RetryExhausted<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut last_error = None;
        let mut attempts = 0;

        let mut schedule = self.schedule().peekable();
        while let Some(attempt) = schedule.next() {
            if attempt.delay_before_attempt > Duration::ZERO {
                DOWNSTREAM_RETRIES.with_label_values(&[operation]).inc();
                tokio::time::sleep(attempt.delay_before_attempt).await;
            }
            attempts = attempt.attempt_number;

            let error = match tokio::time::timeout(self.policy.attempt_timeout, op()).await {
                Ok(Ok(value)) => {
                    if attempt.attempt_number > 1 {
                        tracing::debug!(operation, attempt = attempt.attempt_number, "Retry succeeded");
                    }
                    return Ok(value);
                }
                Ok(Err(e)) => AttemptError::Failed(e),
                Err(_) => AttemptError::TimedOut(self.policy.attempt_timeout),
            };

            let next_delay_ms = schedule
                .peek()
                .map(|next| u64::try_from(next.delay_before_attempt.as_millis()).unwrap_or(u64::MAX));
            tracing::warn!(
                operation,
                attempt = attempt.attempt_number,
                max_attempts = self.policy.max_attempts,
                next_delay_ms,
                error = %error,
                "Downstream attempt failed"
            );
            last_error = Some(error);
        }

        Err(RetryExhausted {
            operation: operation.to_string(),
            attempts,
            last_error: last_error.unwrap_or(AttemptError::TimedOut(Duration::ZERO)),
        })
    }

    fn backoff(&self) -> impl Iterator<Item = Duration> {
        let retries = self.policy.max_attempts.saturating_sub(1);
        // Cap sits above the largest delay so the sequence stays purely exponential
        let max_delay = self
            .policy
            .base_delay
            .saturating_mul(2u32.saturating_pow(retries.min(31)));

        ExponentialBuilder::default()
            .with_min_delay(self.policy.base_delay)
            .with_max_delay(max_delay)
            .with_factor(2.0)
            .with_max_times(retries as usize)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    // The paused clock advances in whole timer ticks
    fn assert_close(actual: Duration, expected: Duration) {
        assert!(
            actual >= expected && actual <= expected + Duration::from_millis(2),
            "expected ~{expected:?}, got {actual:?}"
        );
    }

    fn executor(max_attempts: u32, base_delay_ms: u64) -> RetryExecutor {
        RetryExecutor::new(RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(base_delay_ms),
            attempt_timeout: Duration::from_secs(5),
        })
    }

    #[test]
    fn test_schedule_is_pure_exponential() {
        let delays: Vec<_> = executor(4, 1000)
            .schedule()
            .map(|a| (a.attempt_number, a.delay_before_attempt.as_millis()))
            .collect();

        assert_eq!(delays, vec![(1, 0), (2, 1000), (3, 2000), (4, 4000)]);
    }

    #[test]
    fn test_single_attempt_has_no_delay() {
        let schedule: Vec<_> = executor(0, 1000).schedule().collect();
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule[0].delay_before_attempt, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_backoff_timing() {
        let exec = executor(3, 1000);
        let started = Instant::now();
        let calls = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let result: Result<(), _> = exec
            .execute("always_fails", || {
                let calls = calls.clone();
                async move {
                    calls.lock().push(started.elapsed());
                    Err::<(), _>("connection refused")
                }
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert!(matches!(err.last_error, AttemptError::Failed("connection refused")));

        let calls = calls.lock();
        assert_eq!(calls.len(), 3);
        assert_close(calls[1] - calls[0], Duration::from_millis(1000));
        assert_close(calls[2] - calls[1], Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_recovers() {
        let exec = executor(3, 100);
        let counter = Arc::new(AtomicU32::new(0));

        let result = exec
            .execute("flaky", || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err("timeout")
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_attempt_times_out() {
        let exec = RetryExecutor::new(RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(10),
            attempt_timeout: Duration::from_millis(50),
        });

        let result: Result<(), RetryExhausted<&str>> = exec
            .execute("hangs", || async {
                std::future::pending::<()>().await;
                Ok(())
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 2);
        assert!(matches!(err.last_error, AttemptError::TimedOut(d) if d == Duration::from_millis(50)));
        assert!(err.to_string().contains("hangs failed after 2 attempt(s)"));
    }
}
