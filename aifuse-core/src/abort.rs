//! Cooperative cancellation for function calls.

use crate::error::AiError;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct AbortState {
    aborted: AtomicBool,
    notify: Notify,
}

/// Signal shared between a caller and the calls it wants to cancel.
///
/// Clones observe the same state. Once aborted, a signal stays aborted.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    state: Arc<AbortState>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort every call that uses this signal
    pub fn abort(&self) {
        self.state.aborted.store(true, Ordering::SeqCst);
        self.state.notify.notify_waiters();
    }

    pub fn is_aborted(&self) -> bool {
        self.state.aborted.load(Ordering::SeqCst)
    }

    /// Resolves once the signal is aborted
    pub async fn aborted(&self) {
        loop {
            let notified = self.state.notify.notified();
            if self.is_aborted() {
                return;
            }
            notified.await;
        }
    }

    /// Run `fut` unless the signal fires first, in which case the future is
    /// dropped and [`AiError::Aborted`] is returned.
    pub async fn race<T, F>(&self, fut: F) -> Result<T, AiError>
    where
        F: Future<Output = Result<T, AiError>>,
    {
        if self.is_aborted() {
            return Err(AiError::Aborted);
        }
        tokio::select! {
            biased;
            _ = self.aborted() => Err(AiError::Aborted),
            result = fut => result,
        }
    }
}

/// Sleep that ends early with [`AiError::Aborted`]
pub async fn delay(duration: std::time::Duration, abort: Option<&AbortSignal>) -> Result<(), AiError> {
    match abort {
        Some(signal) => {
            signal
                .race(async {
                    tokio::time::sleep(duration).await;
                    Ok(())
                })
                .await
        }
        None => {
            tokio::time::sleep(duration).await;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_race_completes_without_abort() {
        let signal = AbortSignal::new();
        let value = signal.race(async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_interrupts_pending_future() {
        let signal = AbortSignal::new();
        let trigger = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.abort();
        });

        let result = signal
            .race(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(AiError::Aborted)));
        assert!(signal.is_aborted());
    }

    #[tokio::test]
    async fn test_already_aborted_short_circuits() {
        let signal = AbortSignal::new();
        signal.abort();
        let err = delay(Duration::from_secs(5), Some(&signal)).await.unwrap_err();
        assert!(err.is_abort());
    }
}
