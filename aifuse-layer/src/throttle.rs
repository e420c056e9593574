//! Throttle layer driven by a [`ThrottleStrategy`].

use aifuse_core::error::AiError;
use aifuse_core::impl_layered_provider;
use aifuse_core::layer::{Layer, LayeredProvider};
use aifuse_core::provider::{AudioStream, ChatCompletionStream, Provider};
use aifuse_core::throttle::{throttle_max_concurrency, ThrottleStrategy};
use aifuse_core::types::*;
use async_trait::async_trait;

/// Limits how many provider calls run at once.
///
/// All providers built from one layer share its permits. For streaming
/// calls the permit is held while the stream is opened, not while it is
/// consumed.
#[derive(Debug, Clone, Default)]
pub struct ThrottleLayer {
    strategy: ThrottleStrategy,
}

impl ThrottleLayer {
    pub fn new(strategy: ThrottleStrategy) -> Self {
        Self { strategy }
    }

    /// At most `max_concurrent_calls` calls in flight
    pub fn max_concurrency(max_concurrent_calls: usize) -> Result<Self, AiError> {
        Ok(Self::new(throttle_max_concurrency(max_concurrent_calls)?))
    }

    pub fn strategy(&self) -> &ThrottleStrategy {
        &self.strategy
    }
}

impl<P: Provider> Layer<P> for ThrottleLayer {
    type LayeredProvider = ThrottleProvider<P>;

    fn layer(&self, inner: P) -> Self::LayeredProvider {
        ThrottleProvider {
            inner,
            strategy: self.strategy.clone(),
        }
    }
}

/// Provider wrapped with a concurrency limit
#[derive(Debug)]
pub struct ThrottleProvider<P> {
    inner: P,
    strategy: ThrottleStrategy,
}

#[async_trait]
impl<P: Provider> LayeredProvider for ThrottleProvider<P> {
    type Inner = P;

    fn inner(&self) -> &Self::Inner {
        &self.inner
    }

    async fn layered_chat_completion(
        &self,
        req: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, AiError> {
        self.strategy
            .execute(|| self.inner.chat_completion(req))
            .await
    }

    async fn layered_stream_chat_completion(
        &self,
        req: ChatCompletionRequest,
    ) -> Result<Box<ChatCompletionStream>, AiError> {
        self.strategy
            .execute(|| self.inner.stream_chat_completion(req))
            .await
    }

    async fn layered_embed(&self, req: EmbeddingRequest) -> Result<EmbeddingResponse, AiError> {
        self.strategy.execute(|| self.inner.embed(req)).await
    }

    async fn layered_generate_speech(&self, req: SpeechRequest) -> Result<SpeechResponse, AiError> {
        self.strategy
            .execute(|| self.inner.generate_speech(req))
            .await
    }

    async fn layered_stream_speech(
        &self,
        req: SpeechStreamRequest,
    ) -> Result<Box<AudioStream>, AiError> {
        self.strategy
            .execute(|| self.inner.stream_speech(req))
            .await
    }

    async fn layered_transcribe(
        &self,
        req: TranscriptionRequest,
    ) -> Result<TranscriptionResponse, AiError> {
        self.strategy.execute(|| self.inner.transcribe(req)).await
    }

    async fn layered_generate_image(&self, req: ImageRequest) -> Result<ImageResponse, AiError> {
        self.strategy
            .execute(|| self.inner.generate_image(req))
            .await
    }
}

impl_layered_provider!(<P: Provider> ThrottleProvider<P>);

#[cfg(test)]
mod tests {
    use super::*;
    use aifuse_core::mock::MockProvider;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_calls_run_one_at_a_time() {
        let layer = ThrottleLayer::max_concurrency(1).unwrap();
        let provider = Arc::new(layer.layer(MockProvider::new().with_delay(Duration::from_millis(100))));

        let started = tokio::time::Instant::now();
        let calls = (0..3).map(|_| {
            let provider = provider.clone();
            tokio::spawn(async move {
                provider
                    .chat_completion(ChatCompletionRequest::new("m", vec![]))
                    .await
            })
        });
        for result in futures::future::join_all(calls).await {
            assert!(result.unwrap().is_ok());
        }

        assert!(started.elapsed() >= Duration::from_millis(300));
        assert_eq!(layer.strategy().available_slots(), Some(1));
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        assert!(matches!(
            ThrottleLayer::max_concurrency(0),
            Err(AiError::Configuration(_))
        ));
    }
}
