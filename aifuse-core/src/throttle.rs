//! Throttling strategies for provider calls.

use crate::error::AiError;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Limits how many calls run at the same time.
///
/// Cloning a `MaxConcurrency` throttle shares its permits, so one throttle can
/// guard every call made through an API configuration.
#[derive(Debug, Clone)]
pub enum ThrottleStrategy {
    /// No limit
    Off,
    /// At most `max_concurrent_calls` calls in flight; the rest wait in FIFO order
    MaxConcurrency {
        max_concurrent_calls: usize,
        semaphore: Arc<Semaphore>,
    },
}

impl Default for ThrottleStrategy {
    fn default() -> Self {
        ThrottleStrategy::Off
    }
}

/// Do not throttle
pub fn throttle_off() -> ThrottleStrategy {
    ThrottleStrategy::Off
}

/// Allow at most `max_concurrent_calls` concurrent calls
pub fn throttle_max_concurrency(max_concurrent_calls: usize) -> Result<ThrottleStrategy, AiError> {
    if max_concurrent_calls == 0 {
        return Err(AiError::configuration(
            "max_concurrent_calls must be at least 1",
        ));
    }
    Ok(ThrottleStrategy::MaxConcurrency {
        max_concurrent_calls,
        semaphore: Arc::new(Semaphore::new(max_concurrent_calls)),
    })
}

impl ThrottleStrategy {
    /// Run `operation` once a slot is free
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, AiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AiError>>,
    {
        match self {
            ThrottleStrategy::Off => operation().await,
            ThrottleStrategy::MaxConcurrency { semaphore, .. } => {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|e| AiError::other(format!("Throttle closed: {}", e)))?;
                operation().await
            }
        }
    }

    /// Slots currently free; `None` when throttling is off
    pub fn available_slots(&self) -> Option<usize> {
        match self {
            ThrottleStrategy::Off => None,
            ThrottleStrategy::MaxConcurrency { semaphore, .. } => {
                Some(semaphore.available_permits())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_zero_concurrency_is_rejected() {
        assert!(matches!(
            throttle_max_concurrency(0),
            Err(AiError::Configuration(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_limits_concurrent_calls() {
        let throttle = throttle_max_concurrency(2).unwrap();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks = (0..6).map(|_| {
            let throttle = throttle.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            tokio::spawn(async move {
                throttle
                    .execute(|| async {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .await
            })
        });

        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(throttle.available_slots(), Some(2));
    }

    #[tokio::test]
    async fn test_off_passes_through() {
        let throttle = throttle_off();
        assert_eq!(throttle.execute(|| async { Ok(1) }).await.unwrap(), 1);
        assert_eq!(throttle.available_slots(), None);
    }
}
