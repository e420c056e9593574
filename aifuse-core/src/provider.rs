//! Provider trait and core abstractions.

use crate::error::AiError;
use crate::types::*;
use async_trait::async_trait;
use futures::Stream;
use std::fmt::{self, Debug};
use std::sync::Arc;

/// Stream type alias for chat completion chunks
pub type ChatCompletionStream =
    dyn Stream<Item = Result<ChatCompletionChunk, AiError>> + Send + Unpin;

/// Incremental text input, e.g. for duplex speech streaming
pub type TextInputStream = dyn Stream<Item = String> + Send + Unpin;

/// Stream of encoded audio chunks
pub type AudioStream = dyn Stream<Item = Result<Vec<u8>, AiError>> + Send + Unpin;

/// Model capability a provider can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    TextGeneration,
    TextStreaming,
    Embedding,
    SpeechGeneration,
    SpeechStreaming,
    Transcription,
    ImageGeneration,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::TextGeneration => "text generation",
            Capability::TextStreaming => "text streaming",
            Capability::Embedding => "embedding",
            Capability::SpeechGeneration => "speech generation",
            Capability::SpeechStreaming => "speech streaming",
            Capability::Transcription => "transcription",
            Capability::ImageGeneration => "image generation",
        };
        f.write_str(name)
    }
}

fn unsupported(info: &ProviderInfo, capability: Capability) -> AiError {
    AiError::unsupported(format!("{} does not support {}", info.name, capability))
}

/// Core provider trait for AI services.
///
/// A provider is a thin binding to one vendor API. Every capability method
/// has a default that fails with [`AiError::Unsupported`], so a provider
/// implements only what its API offers. Event emission, logging and the
/// convenience functions (`generate_text`, `embed_many`, ...) live above this
/// trait; retry and throttling are applied by the provider's
/// [`ApiConfiguration`](crate::api::ApiConfiguration) or by layers.
#[async_trait]
pub trait Provider: Send + Sync + Debug + 'static {
    /// Get provider information
    fn info(&self) -> Arc<ProviderInfo>;

    /// Capabilities this provider implements
    fn capabilities(&self) -> Vec<Capability> {
        Vec::new()
    }

    /// Chat completion (non-streaming)
    async fn chat_completion(
        &self,
        _req: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, AiError> {
        Err(unsupported(&self.info(), Capability::TextGeneration))
    }

    /// Stream chat completion
    async fn stream_chat_completion(
        &self,
        _req: ChatCompletionRequest,
    ) -> Result<Box<ChatCompletionStream>, AiError> {
        Err(unsupported(&self.info(), Capability::TextStreaming))
    }

    /// Embed a batch of values
    async fn embed(&self, _req: EmbeddingRequest) -> Result<EmbeddingResponse, AiError> {
        Err(unsupported(&self.info(), Capability::Embedding))
    }

    /// Largest batch the embedding endpoint accepts; `None` means unlimited
    fn max_values_per_embedding_call(&self) -> Option<usize> {
        None
    }

    /// Whether several embedding batches may be sent concurrently
    fn supports_parallel_embedding_calls(&self) -> bool {
        false
    }

    /// Synthesize speech for a complete text
    async fn generate_speech(&self, _req: SpeechRequest) -> Result<SpeechResponse, AiError> {
        Err(unsupported(&self.info(), Capability::SpeechGeneration))
    }

    /// Synthesize speech while text is still arriving
    async fn stream_speech(&self, _req: SpeechStreamRequest) -> Result<Box<AudioStream>, AiError> {
        Err(unsupported(&self.info(), Capability::SpeechStreaming))
    }

    /// Transcribe audio to text
    async fn transcribe(
        &self,
        _req: TranscriptionRequest,
    ) -> Result<TranscriptionResponse, AiError> {
        Err(unsupported(&self.info(), Capability::Transcription))
    }

    /// Generate images from a prompt
    async fn generate_image(&self, _req: ImageRequest) -> Result<ImageResponse, AiError> {
        Err(unsupported(&self.info(), Capability::ImageGeneration))
    }
}

#[async_trait]
impl<P: Provider + ?Sized> Provider for Arc<P> {
    fn info(&self) -> Arc<ProviderInfo> {
        (**self).info()
    }

    fn capabilities(&self) -> Vec<Capability> {
        (**self).capabilities()
    }

    async fn chat_completion(
        &self,
        req: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, AiError> {
        (**self).chat_completion(req).await
    }

    async fn stream_chat_completion(
        &self,
        req: ChatCompletionRequest,
    ) -> Result<Box<ChatCompletionStream>, AiError> {
        (**self).stream_chat_completion(req).await
    }

    async fn embed(&self, req: EmbeddingRequest) -> Result<EmbeddingResponse, AiError> {
        (**self).embed(req).await
    }

    fn max_values_per_embedding_call(&self) -> Option<usize> {
        (**self).max_values_per_embedding_call()
    }

    fn supports_parallel_embedding_calls(&self) -> bool {
        (**self).supports_parallel_embedding_calls()
    }

    async fn generate_speech(&self, req: SpeechRequest) -> Result<SpeechResponse, AiError> {
        (**self).generate_speech(req).await
    }

    async fn stream_speech(&self, req: SpeechStreamRequest) -> Result<Box<AudioStream>, AiError> {
        (**self).stream_speech(req).await
    }

    async fn transcribe(
        &self,
        req: TranscriptionRequest,
    ) -> Result<TranscriptionResponse, AiError> {
        (**self).transcribe(req).await
    }

    async fn generate_image(&self, req: ImageRequest) -> Result<ImageResponse, AiError> {
        (**self).generate_image(req).await
    }
}

/// Drain a chat completion stream into a single [`TextResult`].
///
/// Deltas of the first choice are concatenated. The last reported finish
/// reason and usage win.
pub async fn collect_text_stream(mut stream: Box<ChatCompletionStream>) -> Result<TextResult, AiError> {
    use futures::StreamExt;

    let mut content = String::new();
    let mut model = String::new();
    let mut finish_reason = None;
    let mut usage = None;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if model.is_empty() {
            model = chunk.model.clone();
        }
        if let Some(delta) = chunk.text_delta() {
            content.push_str(delta);
        }
        if let Some(reason) = chunk.finish_reason() {
            finish_reason = Some(reason.clone());
        }
        if let Some(u) = chunk.usage {
            usage = Some(u);
        }
    }

    Ok(TextResult {
        texts: vec![content.clone()],
        content,
        finish_reason: finish_reason.unwrap_or(FinishReason::Stop),
        usage: usage.unwrap_or_default(),
        model,
        tool_calls: None,
    })
}
