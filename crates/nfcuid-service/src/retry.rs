//! Bounded retry with linear back-off.
//!
//! An operation is attempted up to `max_attempts` times. After failed attempt
//! `n` (1-based) the policy sleeps `n * base_delay` before the next one; there
//! is no sleep after the final attempt and none after a success.

use nfcuid_core::AdvancedConfig;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Failure of a retried operation.
#[derive(Debug, Error)]
pub enum RetryError<E: fmt::Debug + fmt::Display> {
    /// Every attempt failed.
    #[error("operation failed after {attempts} attempts, last error: {last}")]
    Exhausted { attempts: u32, last: E },

    /// An attempt returned an error the caller marked as final.
    #[error("operation aborted on attempt {attempt}: {error}")]
    Aborted { attempt: u32, error: E },
}

impl<E: fmt::Debug + fmt::Display> RetryError<E> {
    /// Number of attempts made.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } => *attempts,
            Self::Aborted { attempt, .. } => *attempt,
        }
    }

    /// The error of the last attempt.
    pub fn last(&self) -> &E {
        match self {
            Self::Exhausted { last, .. } => last,
            Self::Aborted { error, .. } => error,
        }
    }

    pub fn into_last(self) -> E {
        match self {
            Self::Exhausted { last, .. } => last,
            Self::Aborted { error, .. } => error,
        }
    }
}

/// Retry policy: attempt budget and back-off unit.
///
/// # Examples
///
/// ```
/// use nfcuid_service::retry::RetryPolicy;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let policy = RetryPolicy::new(3, Duration::ZERO);
///
/// let result: Result<u32, _> = policy
///     .run(|attempt| async move {
///         if attempt < 3 { Err("not yet") } else { Ok(attempt) }
///     })
///     .await;
///
/// assert_eq!(result.unwrap(), 3);
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy. A budget of zero is raised to one attempt.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_config(config: &AdvancedConfig) -> Self {
        Self::new(config.retry_attempts, config.reconnect_delay())
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Back-off applied after failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Run `operation` until it succeeds or the budget is spent.
    ///
    /// The closure receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, operation: F) -> Result<T, RetryError<E>>
    where
        E: fmt::Debug + fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_until(operation, |_| false).await
    }

    /// Like [`run`](Self::run), but stops early when `is_final` accepts an
    /// error. Used when a failure has escalated beyond the operation itself.
    pub async fn run_until<T, E, F, Fut, P>(
        &self,
        mut operation: F,
        is_final: P,
    ) -> Result<T, RetryError<E>>
    where
        E: fmt::Debug + fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let mut attempt = 1;
        loop {
            let error = match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if is_final(&error) {
                return Err(RetryError::Aborted { attempt, error });
            }

            if attempt >= self.max_attempts {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: error,
                });
            }

            let delay = self.delay_after(attempt);
            tracing::debug!(
                attempt,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&AdvancedConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_calls_exactly_max_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_secs(2));
        let calls = Cell::new(0);

        let result: Result<(), _> = policy
            .run(|_| {
                calls.set(calls.get() + 1);
                async { Err("reader gone") }
            })
            .await;

        assert_eq!(calls.get(), 3);
        let err = result.unwrap_err();
        assert_eq!(err.attempts(), 3);
        assert_eq!(*err.last(), "reader gone");
        assert_eq!(
            err.to_string(),
            "operation failed after 3 attempts, last error: reader gone"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovery_on_third_attempt() {
        let policy = RetryPolicy::new(3, Duration::from_secs(2));
        let calls = Cell::new(0);
        let start = Instant::now();

        let result = policy
            .run(|attempt| {
                calls.set(calls.get() + 1);
                async move { if attempt < 3 { Err("busy") } else { Ok("uid") } }
            })
            .await;

        assert_eq!(result.unwrap(), "uid");
        assert_eq!(calls.get(), 3);
        // 1 * 2s after the first failure, 2 * 2s after the second, nothing after success.
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_delay_after_final_attempt() {
        let policy = RetryPolicy::new(2, Duration::from_secs(5));
        let start = Instant::now();

        let _ = policy.run(|_| async { Err::<(), _>("fail") }).await;

        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_success_has_no_delay() {
        let policy = RetryPolicy::new(5, Duration::from_secs(10));
        let start = Instant::now();

        let result = policy.run(|_| async { Ok::<_, &str>(42) }).await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_stops_on_final_error() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1));
        let calls = Cell::new(0);

        let result: Result<(), _> = policy
            .run_until(
                |attempt| {
                    calls.set(calls.get() + 1);
                    async move { Err(if attempt == 2 { "restart" } else { "transient" }) }
                },
                |e| *e == "restart",
            )
            .await;

        assert_eq!(calls.get(), 2);
        assert!(matches!(
            result,
            Err(RetryError::Aborted {
                attempt: 2,
                error: "restart"
            })
        ));
    }

    #[test]
    fn test_zero_budget_means_one_attempt() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(policy.max_attempts(), 1);
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::new(4, Duration::from_secs(2));
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(3), Duration::from_secs(6));
    }
}
