//! Retry and throttle composition used around every provider API call.

use crate::abort::AbortSignal;
use crate::error::AiError;
use crate::retry::RetryStrategy;
use crate::throttle::ThrottleStrategy;
use std::future::Future;

/// Run `call` with `retry` around `throttle`.
///
/// Each attempt acquires its own throttle slot, so a call waiting out its
/// backoff does not hold a slot.
pub async fn call_with_retry_and_throttle<T, F, Fut>(
    retry: &RetryStrategy,
    throttle: &ThrottleStrategy,
    abort: Option<&AbortSignal>,
    mut call: F,
) -> Result<T, AiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AiError>>,
{
    retry
        .execute(
            || {
                let attempt = call();
                async move {
                    let attempt = throttle.execute(|| attempt);
                    match abort {
                        Some(signal) => signal.race(attempt).await,
                        None => attempt.await,
                    }
                }
            },
            abort,
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiCallError;
    use crate::retry::retry_with_exponential_backoff;
    use crate::throttle::throttle_max_concurrency;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_retries_through_throttle() {
        let calls = AtomicU32::new(0);
        let retry = retry_with_exponential_backoff(3, Duration::from_millis(5), 2.0).unwrap();
        let throttle = throttle_max_concurrency(1).unwrap();

        let value = call_with_retry_and_throttle(&retry, &throttle, None, || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ApiCallError::new("x", "u", serde_json::Value::Null)
                    .with_status(503)
                    .into())
            } else {
                Ok(42)
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(throttle.available_slots(), Some(1));
    }

    #[tokio::test]
    async fn test_aborted_signal_prevents_call() {
        let signal = AbortSignal::new();
        signal.abort();
        let err = call_with_retry_and_throttle(
            &RetryStrategy::default(),
            &ThrottleStrategy::Off,
            Some(&signal),
            || async { Ok(()) },
        )
        .await
        .unwrap_err();
        assert!(err.is_abort());
    }
}
