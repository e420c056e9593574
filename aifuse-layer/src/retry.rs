//! Retry layer driven by a [`RetryStrategy`].

use aifuse_core::error::AiError;
use aifuse_core::impl_layered_provider;
use aifuse_core::layer::{Layer, LayeredProvider};
use aifuse_core::provider::{ChatCompletionStream, Provider};
use aifuse_core::retry::RetryStrategy;
use aifuse_core::types::*;
use async_trait::async_trait;
use std::time::Duration;

/// Retries failed provider calls.
///
/// Streaming calls only retry opening the stream; nothing is retried once
/// deltas flow. `stream_speech` consumes its text input and is never
/// retried.
#[derive(Debug, Clone, Default)]
pub struct RetryLayer {
    strategy: RetryStrategy,
}

impl RetryLayer {
    /// Exponential backoff with the default settings
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(strategy: RetryStrategy) -> Self {
        Self { strategy }
    }

    /// Exponential backoff with `max_tries` attempts in total
    pub fn with_max_tries(self, max_tries: u32) -> Self {
        self.update(|max, _, _| *max = max_tries)
    }

    pub fn with_initial_delay(self, initial_delay: Duration) -> Self {
        self.update(|_, delay, _| *delay = initial_delay)
    }

    /// Calls fail with a configuration error unless `backoff_factor` is
    /// finite and at least 1.0
    pub fn with_backoff_factor(self, backoff_factor: f64) -> Self {
        self.update(|_, _, factor| *factor = backoff_factor)
    }

    fn update(mut self, apply: impl FnOnce(&mut u32, &mut Duration, &mut f64)) -> Self {
        if let RetryStrategy::Never = self.strategy {
            self.strategy = RetryStrategy::default();
        }
        if let RetryStrategy::ExponentialBackoff {
            max_tries,
            initial_delay,
            backoff_factor,
        } = &mut self.strategy
        {
            apply(max_tries, initial_delay, backoff_factor);
        }
        self
    }

    pub fn strategy(&self) -> &RetryStrategy {
        &self.strategy
    }
}

impl<P: Provider> Layer<P> for RetryLayer {
    type LayeredProvider = RetryProvider<P>;

    fn layer(&self, inner: P) -> Self::LayeredProvider {
        RetryProvider {
            inner,
            strategy: self.strategy.clone(),
        }
    }
}

/// Provider wrapped with retry logic
#[derive(Debug)]
pub struct RetryProvider<P> {
    inner: P,
    strategy: RetryStrategy,
}

#[async_trait]
impl<P: Provider> LayeredProvider for RetryProvider<P> {
    type Inner = P;

    fn inner(&self) -> &Self::Inner {
        &self.inner
    }

    async fn layered_chat_completion(
        &self,
        req: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, AiError> {
        self.strategy
            .execute(|| self.inner.chat_completion(req.clone()), None)
            .await
    }

    async fn layered_stream_chat_completion(
        &self,
        req: ChatCompletionRequest,
    ) -> Result<Box<ChatCompletionStream>, AiError> {
        self.strategy
            .execute(|| self.inner.stream_chat_completion(req.clone()), None)
            .await
    }

    async fn layered_embed(&self, req: EmbeddingRequest) -> Result<EmbeddingResponse, AiError> {
        self.strategy
            .execute(|| self.inner.embed(req.clone()), None)
            .await
    }

    async fn layered_generate_speech(&self, req: SpeechRequest) -> Result<SpeechResponse, AiError> {
        self.strategy
            .execute(|| self.inner.generate_speech(req.clone()), None)
            .await
    }

    async fn layered_transcribe(
        &self,
        req: TranscriptionRequest,
    ) -> Result<TranscriptionResponse, AiError> {
        self.strategy
            .execute(|| self.inner.transcribe(req.clone()), None)
            .await
    }

    async fn layered_generate_image(&self, req: ImageRequest) -> Result<ImageResponse, AiError> {
        self.strategy
            .execute(|| self.inner.generate_image(req.clone()), None)
            .await
    }
}

impl_layered_provider!(<P: Provider> RetryProvider<P>);

#[cfg(test)]
mod tests {
    use super::*;
    use aifuse_core::error::RetryErrorReason;
    use aifuse_core::mock::MockProvider;
    use std::sync::Arc;

    fn request() -> ChatCompletionRequest {
        ChatCompletionRequest::new("m", vec![Message::user("hi")])
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_failures() {
        let mock = Arc::new(MockProvider::new().with_transient_failures(2));
        let provider = RetryLayer::new()
            .with_initial_delay(Duration::from_millis(10))
            .layer(mock.clone());

        let response = provider.chat_completion(request()).await.unwrap();
        assert_eq!(response.choices.len(), 1);
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_tries() {
        let mock = Arc::new(MockProvider::new().with_transient_failures(10));
        let provider = RetryLayer::new().with_max_tries(2).layer(mock.clone());

        match provider.embed(EmbeddingRequest::new("e", vec!["a".into()])).await {
            Err(AiError::Retry(e)) => {
                assert_eq!(e.reason, RetryErrorReason::MaxTriesExceeded);
                assert_eq!(e.errors.len(), 2);
            }
            other => panic!("expected retry error, got {other:?}"),
        }
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_error_is_returned_as_is() {
        let mock = Arc::new(MockProvider::new().with_failure(AiError::invalid_request("bad")));
        let provider = RetryLayer::new().layer(mock.clone());

        let err = provider.chat_completion(request()).await.unwrap_err();
        assert!(matches!(err, AiError::InvalidRequest(_)));
        assert_eq!(mock.calls(), 1);
    }

    #[test]
    fn test_builder_switches_never_to_backoff() {
        let layer = RetryLayer::with_strategy(RetryStrategy::Never).with_max_tries(5);
        assert!(matches!(
            layer.strategy(),
            RetryStrategy::ExponentialBackoff { max_tries: 5, .. }
        ));
    }

    #[tokio::test]
    async fn test_invalid_backoff_factor_fails_calls() {
        let mock = Arc::new(MockProvider::new().with_transient_failures(1));
        let provider = RetryLayer::new().with_backoff_factor(f64::NAN).layer(mock.clone());

        let err = provider.chat_completion(request()).await.unwrap_err();
        assert!(matches!(err, AiError::Configuration(_)));
        assert_eq!(mock.calls(), 0);
    }
}
