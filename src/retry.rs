use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry policy applied around data-source calls
///
/// Delays grow exponentially from `initial_delay` by `multiplier`, capped at
/// `max_delay`, with +/- `jitter` (a fraction of the delay) of randomness.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: 0.1,
        }
    }
}

/// Outcome of a retried operation that never succeeded
#[derive(Debug)]
pub struct RetryError<E> {
    pub error: E,
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Policy without any sleeping between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::ZERO,
            multiplier: 1.0,
            max_delay: Duration::ZERO,
            jitter: 0.0,
        }
    }

    /// Delay before the retry following the given zero-based attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_millis() as f64);

        let jitter_range = capped * self.jitter;
        let jitter = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..jitter_range)
        } else {
            0.0
        };

        Duration::from_millis((capped + jitter).max(0.0) as u64)
    }

    /// Run `operation` until it succeeds, `is_retryable` rejects the error,
    /// or `max_attempts` is reached.
    pub async fn run<F, Fut, T, E, P>(
        &self,
        operation_name: &str,
        is_retryable: P,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        P: Fn(&E) -> bool,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(
                            operation = operation_name,
                            attempt = attempt + 1,
                            "Operation succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(error) => {
                    attempt += 1;

                    if !is_retryable(&error) || attempt >= max_attempts {
                        if attempt > 1 {
                            warn!(
                                operation = operation_name,
                                error = %error,
                                attempts = attempt,
                                "Operation failed after all retry attempts"
                            );
                        }
                        return Err(RetryError { error, attempts: attempt });
                    }

                    let delay = self.delay_for_attempt(attempt - 1);
                    warn!(
                        operation = operation_name,
                        error = %error,
                        attempt = attempt,
                        max_attempts = max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Retryable error, will retry after delay"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_exponential_delay() {
        let policy = RetryPolicy {
            jitter: 0.0,
            ..Default::default()
        };

        assert_eq!(policy.delay_for_attempt(0).as_millis(), 1000);
        assert_eq!(policy.delay_for_attempt(1).as_millis(), 2000);
        assert_eq!(policy.delay_for_attempt(2).as_millis(), 4000);
        assert_eq!(policy.delay_for_attempt(3).as_millis(), 8000);
        // capped
        assert_eq!(policy.delay_for_attempt(10).as_millis(), 30_000);
    }

    #[test]
    fn test_delay_with_jitter_stays_in_range() {
        let policy = RetryPolicy {
            jitter: 0.2,
            ..Default::default()
        };

        for _ in 0..20 {
            let ms = policy.delay_for_attempt(0).as_millis();
            assert!((800..=1200).contains(&ms), "Delay {} out of range", ms);
        }
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::immediate(5);

        let result = policy
            .run("flaky", |_: &String| true, || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(format!("failure {}", n))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::immediate(5);

        let result: Result<(), _> = policy
            .run("down", |_: &String| true, || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("connection refused".to_string())
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 5);
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_fast() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::immediate(5);

        let result: Result<(), _> = policy
            .run("decode", |_: &String| false, || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("column not found".to_string())
            })
            .await;

        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
