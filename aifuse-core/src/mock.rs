//! Scriptable in-memory provider for tests.

use crate::error::{AiError, ApiCallError};
use crate::provider::{AudioStream, Capability, ChatCompletionStream, Provider};
use crate::types::*;
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Provider that answers from canned data.
///
/// - chat completion returns one choice per configured text
/// - streaming yields the configured chunks, then an optional error
/// - embeddings are `[value length, call index]` per value
/// - speech returns the configured audio; streamed speech echoes the bytes
///   of every text piece
/// - image generation returns the configured base64 images
///
/// The first `transient_failures` calls fail with a retryable 503 error;
/// a configured `failure` fails every call.
#[derive(Debug)]
pub struct MockProvider {
    info: Arc<ProviderInfo>,
    texts: Vec<String>,
    chunks: Vec<String>,
    stream_error: Option<AiError>,
    usage: Usage,
    audio: Vec<u8>,
    transcription: String,
    images: Vec<String>,
    max_values_per_embedding_call: Option<usize>,
    parallel_embedding_calls: bool,
    delay: Option<Duration>,
    transient_failures: AtomicUsize,
    failure: Option<AiError>,
    calls: AtomicUsize,
    embedding_batches: Mutex<Vec<usize>>,
    requests: Mutex<Vec<ChatCompletionRequest>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            info: Arc::new(ProviderInfo::new("mock", "Mock")),
            texts: vec!["Hello from mock".to_string()],
            chunks: Vec::new(),
            stream_error: None,
            usage: Usage::new(3, 4),
            audio: Vec::new(),
            transcription: String::new(),
            images: Vec::new(),
            max_values_per_embedding_call: None,
            parallel_embedding_calls: false,
            delay: None,
            transient_failures: AtomicUsize::new(0),
            failure: None,
            calls: AtomicUsize::new(0),
            embedding_batches: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.info = Arc::new(ProviderInfo::new(id.clone(), id));
        self
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_texts(vec![text.into()])
    }

    /// One choice per text
    pub fn with_texts(mut self, texts: Vec<String>) -> Self {
        self.texts = texts;
        self
    }

    pub fn with_chunks<I, S>(mut self, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chunks = chunks.into_iter().map(Into::into).collect();
        self
    }

    /// Error yielded after the last chunk
    pub fn with_stream_error(mut self, error: AiError) -> Self {
        self.stream_error = Some(error);
        self
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_audio(mut self, audio: Vec<u8>) -> Self {
        self.audio = audio;
        self
    }

    pub fn with_transcription(mut self, text: impl Into<String>) -> Self {
        self.transcription = text.into();
        self
    }

    pub fn with_images(mut self, base64_images: Vec<String>) -> Self {
        self.images = base64_images;
        self
    }

    pub fn with_max_values_per_embedding_call(mut self, max: usize) -> Self {
        self.max_values_per_embedding_call = Some(max);
        self
    }

    pub fn with_parallel_embedding_calls(mut self, parallel: bool) -> Self {
        self.parallel_embedding_calls = parallel;
        self
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail the first `n` calls with a retryable server error
    pub fn with_transient_failures(self, n: usize) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Fail every call with `error`
    pub fn with_failure(mut self, error: AiError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Number of capability calls so far, failed ones included
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Size of every embedding batch received, in arrival order
    pub fn embedding_batches(&self) -> Vec<usize> {
        self.embedding_batches
            .lock()
            .map(|b| b.clone())
            .unwrap_or_default()
    }

    /// Chat completion requests received, streaming ones included
    pub fn requests(&self) -> Vec<ChatCompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    async fn begin_call(&self) -> Result<usize, AiError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ApiCallError::new("mock overloaded", "mock://", serde_json::Value::Null)
                .with_status(503)
                .into());
        }
        Ok(index)
    }

    fn record(&self, req: &ChatCompletionRequest) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(req.clone());
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn info(&self) -> Arc<ProviderInfo> {
        self.info.clone()
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![
            Capability::TextGeneration,
            Capability::TextStreaming,
            Capability::Embedding,
            Capability::SpeechGeneration,
            Capability::SpeechStreaming,
            Capability::Transcription,
            Capability::ImageGeneration,
        ]
    }

    async fn chat_completion(
        &self,
        req: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, AiError> {
        self.record(&req);
        let index = self.begin_call().await?;

        let choices = self
            .texts
            .iter()
            .enumerate()
            .map(|(i, text)| Choice {
                index: i as u32,
                message: Message::assistant(text.clone()),
                finish_reason: FinishReason::Stop,
            })
            .collect();

        Ok(ChatCompletionResponse {
            id: format!("mock-{}", index),
            model: req.model,
            choices,
            usage: self.usage,
            created: None,
            raw: Some(serde_json::json!({ "texts": self.texts })),
        })
    }

    async fn stream_chat_completion(
        &self,
        req: ChatCompletionRequest,
    ) -> Result<Box<ChatCompletionStream>, AiError> {
        self.record(&req);
        let index = self.begin_call().await?;

        let last = self.chunks.len().saturating_sub(1);
        let mut items: Vec<Result<ChatCompletionChunk, AiError>> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(i, text)| {
                Ok(ChatCompletionChunk {
                    id: format!("mock-{}", index),
                    model: req.model.clone(),
                    choices: vec![ChoiceDelta {
                        index: 0,
                        delta: MessageDelta {
                            content: Some(text.clone()),
                            ..Default::default()
                        },
                        finish_reason: (i == last).then_some(FinishReason::Stop),
                    }],
                    usage: (i == last).then_some(self.usage),
                })
            })
            .collect();
        if let Some(error) = &self.stream_error {
            items.push(Err(error.clone()));
        }

        let delay = self.delay;
        let stream = futures::stream::iter(items).then(move |item| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            item
        });
        Ok(Box::new(Box::pin(stream)))
    }

    async fn embed(&self, req: EmbeddingRequest) -> Result<EmbeddingResponse, AiError> {
        let index = self.begin_call().await?;
        if let Ok(mut batches) = self.embedding_batches.lock() {
            batches.push(req.values.len());
        }

        if let Some(max) = self.max_values_per_embedding_call {
            if req.values.len() > max {
                return Err(AiError::invalid_request(format!(
                    "Too many values: {} > {}",
                    req.values.len(),
                    max
                )));
            }
        }

        let embeddings = req
            .values
            .iter()
            .map(|value| vec![value.chars().count() as f32, index as f32])
            .collect();

        Ok(EmbeddingResponse {
            embeddings,
            usage: Some(Usage::new(req.values.len() as u32, 0)),
            raw: None,
        })
    }

    fn max_values_per_embedding_call(&self) -> Option<usize> {
        self.max_values_per_embedding_call
    }

    fn supports_parallel_embedding_calls(&self) -> bool {
        self.parallel_embedding_calls
    }

    async fn generate_speech(&self, req: SpeechRequest) -> Result<SpeechResponse, AiError> {
        self.begin_call().await?;
        let audio = if self.audio.is_empty() {
            req.text.into_bytes()
        } else {
            self.audio.clone()
        };
        Ok(SpeechResponse {
            audio,
            mime_type: "audio/mpeg".to_string(),
            raw: None,
        })
    }

    async fn stream_speech(&self, req: SpeechStreamRequest) -> Result<Box<AudioStream>, AiError> {
        self.begin_call().await?;
        let stream = req.text.map(|text| Ok(text.into_bytes()));
        Ok(Box::new(stream))
    }

    async fn transcribe(
        &self,
        req: TranscriptionRequest,
    ) -> Result<TranscriptionResponse, AiError> {
        self.begin_call().await?;
        Ok(TranscriptionResponse {
            text: self.transcription.clone(),
            language: req.language,
            duration_secs: None,
            segments: Vec::new(),
            raw: None,
        })
    }

    async fn generate_image(&self, req: ImageRequest) -> Result<ImageResponse, AiError> {
        self.begin_call().await?;
        let n = req.n.unwrap_or(1) as usize;
        Ok(ImageResponse {
            images: self.images.iter().take(n.max(1)).cloned().collect(),
            raw: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_transient_failures_then_success() {
        let provider = MockProvider::new().with_transient_failures(2);
        let req = ChatCompletionRequest::new("m", vec![Message::user("hi")]);

        assert!(provider.chat_completion(req.clone()).await.unwrap_err().is_retryable());
        assert!(provider.chat_completion(req.clone()).await.is_err());
        let response = provider.chat_completion(req).await.unwrap();

        assert_eq!(response.choices[0].message.text_content(), "Hello from mock");
        assert_eq!(provider.calls(), 3);
        assert_eq!(provider.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_stream_chunks_then_error() {
        let provider = MockProvider::new()
            .with_chunks(["a", "b"])
            .with_stream_error(AiError::stream("cut"));
        let stream = provider
            .stream_chat_completion(ChatCompletionRequest::new("m", vec![]))
            .await
            .unwrap();
        let items: Vec<_> = stream.collect().await;

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap().text_delta(), Some("a"));
        assert!(items[1].as_ref().unwrap().finish_reason().is_some());
        assert!(items[2].is_err());
    }
}
