//! Retry strategies for provider calls.

use crate::abort::{delay, AbortSignal};
use crate::error::{AiError, RetryError};
use std::future::Future;
use std::time::Duration;

/// How failed calls are retried.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// Call exactly once
    Never,
    /// Retry retryable errors with exponentially growing delays
    ExponentialBackoff {
        /// Total number of attempts, including the first one
        max_tries: u32,
        initial_delay: Duration,
        backoff_factor: f64,
    },
}

impl Default for RetryStrategy {
    fn default() -> Self {
        RetryStrategy::ExponentialBackoff {
            max_tries: 3,
            initial_delay: Duration::from_secs(2),
            backoff_factor: 2.0,
        }
    }
}

/// Never retry
pub fn retry_never() -> RetryStrategy {
    RetryStrategy::Never
}

/// Retry with exponential backoff.
///
/// `backoff_factor` must be finite and at least 1.0.
pub fn retry_with_exponential_backoff(
    max_tries: u32,
    initial_delay: Duration,
    backoff_factor: f64,
) -> Result<RetryStrategy, AiError> {
    check_backoff_factor(backoff_factor)?;
    Ok(RetryStrategy::ExponentialBackoff {
        max_tries,
        initial_delay,
        backoff_factor,
    })
}

fn check_backoff_factor(backoff_factor: f64) -> Result<(), AiError> {
    if backoff_factor.is_finite() && backoff_factor >= 1.0 {
        Ok(())
    } else {
        Err(AiError::configuration(format!(
            "backoff_factor must be a finite number >= 1.0, got {}",
            backoff_factor
        )))
    }
}

/// `delay * factor`, saturating at `Duration::MAX`
fn next_delay(delay: Duration, factor: f64) -> Duration {
    Duration::try_from_secs_f64(delay.as_secs_f64() * factor).unwrap_or(Duration::MAX)
}

impl RetryStrategy {
    /// Execute `operation` under this strategy.
    ///
    /// `operation` is invoked once per attempt. Aborts are returned as-is and
    /// also interrupt a pending backoff sleep. An invalid `backoff_factor`
    /// fails with [`AiError::Configuration`] before the first attempt.
    pub async fn execute<T, F, Fut>(
        &self,
        mut operation: F,
        abort: Option<&AbortSignal>,
    ) -> Result<T, AiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AiError>>,
    {
        let (max_tries, mut delay_for_attempt, backoff_factor) = match self {
            RetryStrategy::Never => return operation().await,
            RetryStrategy::ExponentialBackoff {
                max_tries: 0, ..
            } => return operation().await,
            RetryStrategy::ExponentialBackoff {
                max_tries,
                initial_delay,
                backoff_factor,
            } => (*max_tries, *initial_delay, *backoff_factor),
        };
        check_backoff_factor(backoff_factor)?;

        let mut errors: Vec<AiError> = Vec::new();

        loop {
            let error = match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => e,
            };

            if error.is_abort() {
                return Err(error);
            }

            let retryable = error.is_retryable();
            let retry_after = error.retry_after();
            errors.push(error);
            let try_number = errors.len() as u32;

            if try_number >= max_tries {
                return Err(RetryError::max_tries_exceeded(errors).into());
            }

            if !retryable {
                if try_number == 1 {
                    return Err(errors.remove(0));
                }
                return Err(RetryError::not_retryable(errors).into());
            }

            let wait = retry_after.map_or(delay_for_attempt, |ra| ra.max(delay_for_attempt));
            tracing::debug!(
                attempt = try_number,
                max_tries,
                wait_ms = wait.as_millis() as u64,
                "Retrying after retryable error"
            );
            delay(wait, abort).await?;

            delay_for_attempt = next_delay(delay_for_attempt, backoff_factor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApiCallError, RetryErrorReason};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn server_error() -> AiError {
        ApiCallError::new("boom", "https://api.test/x", serde_json::Value::Null)
            .with_status(500)
            .into()
    }

    fn bad_request() -> AiError {
        ApiCallError::new("bad", "https://api.test/x", serde_json::Value::Null)
            .with_status(400)
            .into()
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_retryable_failures() {
        let calls = AtomicU32::new(0);
        let strategy = retry_with_exponential_backoff(3, Duration::from_millis(100), 2.0).unwrap();

        let start = tokio::time::Instant::now();
        let result = strategy
            .execute(
                || async {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(server_error())
                    } else {
                        Ok("done")
                    }
                },
                None,
            )
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 100ms + 200ms of backoff
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_tries_exceeded_collects_errors() {
        let calls = AtomicU32::new(0);
        let strategy = retry_with_exponential_backoff(3, Duration::from_millis(10), 2.0).unwrap();

        let err = strategy
            .execute(
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(server_error())
                },
                None,
            )
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match err {
            AiError::Retry(retry) => {
                assert_eq!(retry.reason, RetryErrorReason::MaxTriesExceeded);
                assert_eq!(retry.errors.len(), 3);
            }
            other => panic!("expected retry error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_first_non_retryable_error_is_returned_as_is() {
        let calls = AtomicU32::new(0);
        let err = RetryStrategy::default()
            .execute(
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(bad_request())
                },
                None,
            )
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, AiError::ApiCall(ref e) if e.status_code == Some(400)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_after_retry_wraps_errors() {
        let calls = AtomicU32::new(0);
        let strategy = retry_with_exponential_backoff(5, Duration::from_millis(10), 2.0).unwrap();

        let err = strategy
            .execute(
                || async {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err::<(), _>(server_error())
                    } else {
                        Err(bad_request())
                    }
                },
                None,
            )
            .await
            .unwrap_err();

        match err {
            AiError::Retry(retry) => {
                assert_eq!(retry.reason, RetryErrorReason::ErrorNotRetryable);
                assert_eq!(retry.errors.len(), 2);
            }
            other => panic!("expected retry error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_never_and_zero_tries_call_once() {
        for strategy in [
            retry_never(),
            retry_with_exponential_backoff(0, Duration::from_secs(1), 2.0).unwrap(),
        ] {
            let calls = AtomicU32::new(0);
            let err = strategy
                .execute(
                    || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err::<(), _>(server_error())
                    },
                    None,
                )
                .await
                .unwrap_err();
            assert_eq!(calls.load(Ordering::SeqCst), 1);
            assert!(matches!(err, AiError::ApiCall(_)));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_extends_delay() {
        let calls = AtomicU32::new(0);
        let strategy = retry_with_exponential_backoff(2, Duration::from_millis(10), 2.0).unwrap();

        let start = tokio::time::Instant::now();
        let _ = strategy
            .execute(
                || async {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        let err: AiError =
                            ApiCallError::new("slow", "u", serde_json::Value::Null)
                                .with_status(429)
                                .with_retry_after(Duration::from_secs(3))
                                .into();
                        Err(err)
                    } else {
                        Ok(())
                    }
                },
                None,
            )
            .await;

        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_during_backoff() {
        let signal = AbortSignal::new();
        let trigger = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.abort();
        });

        let strategy = retry_with_exponential_backoff(3, Duration::from_secs(10), 2.0).unwrap();
        let err = strategy
            .execute(|| async { Err::<(), _>(server_error()) }, Some(&signal))
            .await
            .unwrap_err();
        assert!(err.is_abort());
    }

    #[test]
    fn test_invalid_backoff_factor_is_rejected() {
        for factor in [-1.0, 0.5, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                retry_with_exponential_backoff(3, Duration::from_millis(10), factor),
                Err(AiError::Configuration(_))
            ));
        }
        assert!(retry_with_exponential_backoff(3, Duration::from_millis(10), 1.0).is_ok());
    }

    #[tokio::test]
    async fn test_invalid_factor_fails_before_first_attempt() {
        let calls = AtomicU32::new(0);
        let strategy = RetryStrategy::ExponentialBackoff {
            max_tries: 3,
            initial_delay: Duration::from_millis(10),
            backoff_factor: -1.0,
        };

        let err = strategy
            .execute(
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(server_error())
                },
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AiError::Configuration(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_next_delay_saturates() {
        assert_eq!(next_delay(Duration::from_millis(100), 2.0), Duration::from_millis(200));
        assert_eq!(next_delay(Duration::MAX, 2.0), Duration::MAX);
        assert_eq!(next_delay(Duration::from_secs(1), 1e300), Duration::MAX);
    }
}
