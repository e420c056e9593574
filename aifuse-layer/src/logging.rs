//! Logging layer for provider operations.

use aifuse_core::error::AiError;
use aifuse_core::impl_layered_provider;
use aifuse_core::layer::{Layer, LayeredProvider};
use aifuse_core::provider::{AudioStream, ChatCompletionStream, Provider};
use aifuse_core::types::*;
use async_trait::async_trait;
use std::time::{Duration, Instant};

/// Logging layer that traces every provider call with its elapsed time.
///
/// Successes are logged at `debug`, failures at `error`.
#[derive(Debug, Clone)]
pub struct LoggingLayer {
    prefix: String,
}

impl LoggingLayer {
    pub fn new() -> Self {
        Self {
            prefix: "[aifuse]".to_string(),
        }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for LoggingLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Provider> Layer<P> for LoggingLayer {
    type LayeredProvider = LoggingProvider<P>;

    fn layer(&self, inner: P) -> Self::LayeredProvider {
        LoggingProvider {
            inner,
            prefix: self.prefix.clone(),
        }
    }
}

/// Provider wrapped with logging
#[derive(Debug)]
pub struct LoggingProvider<P> {
    inner: P,
    prefix: String,
}

impl<P: Provider> LoggingProvider<P> {
    fn log_result<T>(&self, operation: &str, model: &str, elapsed: Duration, result: &Result<T, AiError>) {
        match result {
            Ok(_) => tracing::debug!(
                provider = %self.inner.info().id,
                model = %model,
                elapsed = ?elapsed,
                "{} {} success",
                self.prefix,
                operation
            ),
            Err(e) => tracing::error!(
                provider = %self.inner.info().id,
                model = %model,
                elapsed = ?elapsed,
                error = %e,
                "{} {} error",
                self.prefix,
                operation
            ),
        }
    }
}

#[async_trait]
impl<P: Provider> LayeredProvider for LoggingProvider<P> {
    type Inner = P;

    fn inner(&self) -> &Self::Inner {
        &self.inner
    }

    async fn layered_chat_completion(
        &self,
        req: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, AiError> {
        tracing::debug!(
            "{} chat_completion request: model={}, messages={}",
            self.prefix,
            req.model,
            req.messages.len()
        );

        let model = req.model.clone();
        let start = Instant::now();
        let result = self.inner.chat_completion(req).await;
        self.log_result("chat_completion", &model, start.elapsed(), &result);

        if let Ok(response) = &result {
            tracing::debug!(
                "{} chat_completion id={}, tokens={}",
                self.prefix,
                response.id,
                response.usage.total_tokens
            );
        }
        result
    }

    async fn layered_stream_chat_completion(
        &self,
        req: ChatCompletionRequest,
    ) -> Result<Box<ChatCompletionStream>, AiError> {
        tracing::debug!(
            "{} stream_chat_completion request: model={}, messages={}",
            self.prefix,
            req.model,
            req.messages.len()
        );

        let model = req.model.clone();
        let start = Instant::now();
        let result = self.inner.stream_chat_completion(req).await;
        self.log_result("stream_chat_completion", &model, start.elapsed(), &result);
        result
    }

    async fn layered_embed(&self, req: EmbeddingRequest) -> Result<EmbeddingResponse, AiError> {
        tracing::debug!("{} embed request: model={}, values={}", self.prefix, req.model, req.values.len());

        let model = req.model.clone();
        let start = Instant::now();
        let result = self.inner.embed(req).await;
        self.log_result("embed", &model, start.elapsed(), &result);
        result
    }

    async fn layered_generate_speech(&self, req: SpeechRequest) -> Result<SpeechResponse, AiError> {
        let model = req.model.clone();
        let start = Instant::now();
        let result = self.inner.generate_speech(req).await;
        self.log_result("generate_speech", &model, start.elapsed(), &result);
        result
    }

    async fn layered_stream_speech(
        &self,
        req: SpeechStreamRequest,
    ) -> Result<Box<AudioStream>, AiError> {
        let model = req.model.clone();
        let start = Instant::now();
        let result = self.inner.stream_speech(req).await;
        self.log_result("stream_speech", &model, start.elapsed(), &result);
        result
    }

    async fn layered_transcribe(
        &self,
        req: TranscriptionRequest,
    ) -> Result<TranscriptionResponse, AiError> {
        tracing::debug!(
            "{} transcribe request: model={}, audio_bytes={}",
            self.prefix,
            req.model,
            req.audio.len()
        );

        let model = req.model.clone();
        let start = Instant::now();
        let result = self.inner.transcribe(req).await;
        self.log_result("transcribe", &model, start.elapsed(), &result);
        result
    }

    async fn layered_generate_image(&self, req: ImageRequest) -> Result<ImageResponse, AiError> {
        let model = req.model.clone();
        let start = Instant::now();
        let result = self.inner.generate_image(req).await;
        self.log_result("generate_image", &model, start.elapsed(), &result);
        result
    }
}

impl_layered_provider!(<P: Provider> LoggingProvider<P>);

#[cfg(test)]
mod tests {
    use super::*;
    use aifuse_core::mock::MockProvider;

    #[tokio::test]
    async fn test_logging_forwards_results() {
        let provider = LoggingLayer::with_prefix("[test]").layer(MockProvider::new().with_text("ok"));

        let response = provider
            .chat_completion(ChatCompletionRequest::new("m", vec![Message::user("hi")]))
            .await
            .unwrap();
        assert_eq!(response.choices[0].message.text_content(), "ok");
        assert_eq!(provider.info().id, "mock");
        assert_eq!(provider.capabilities().len(), 7);
    }

    #[tokio::test]
    async fn test_logging_forwards_errors() {
        let provider =
            LoggingLayer::new().layer(MockProvider::new().with_failure(AiError::authentication("bad key")));

        let err = provider
            .embed(EmbeddingRequest::new("e", vec!["x".into()]))
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Authentication(_)));
    }
}
