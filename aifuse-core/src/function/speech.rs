//! Speech synthesis.

use crate::error::AiError;
use crate::event::{CallMetadata, FunctionType};
use crate::function::{model_information, FunctionOptions};
use crate::provider::Provider;
use crate::queue::AsyncQueue;
use crate::runtime::{execute_standard_call, execute_stream_call, CallContext, DeltaProcessor, Generated};
use crate::types::{SpeechRequest, SpeechResponse, SpeechStreamRequest};
use futures::{Stream, StreamExt};

/// Synthesize speech for a complete text
pub async fn generate_speech<P: Provider + ?Sized>(
    provider: &P,
    request: SpeechRequest,
    options: FunctionOptions,
) -> Result<SpeechResponse, AiError> {
    let ctx = CallContext::new(
        FunctionType::GenerateSpeech,
        model_information(provider, &request.model),
        serde_json::to_value(&request)?,
        options,
    );

    let output = execute_standard_call(ctx, || async move {
        let response = provider.generate_speech(request).await?;
        let event_value = serde_json::json!({
            "mime_type": response.mime_type,
            "bytes": response.audio.len(),
        });
        let raw = response.raw.clone();
        Ok(Generated::new(response, event_value).with_raw_response(raw))
    })
    .await?;

    Ok(output.value)
}

#[derive(Default)]
struct AudioDeltas {
    chunks: usize,
    bytes: usize,
}

impl DeltaProcessor<Vec<u8>> for AudioDeltas {
    type Output = Vec<u8>;

    fn process(&mut self, delta: Vec<u8>) -> Vec<Vec<u8>> {
        if delta.is_empty() {
            return Vec::new();
        }
        self.chunks += 1;
        self.bytes += delta.len();
        vec![delta]
    }

    fn event_value(&self) -> serde_json::Value {
        serde_json::json!({ "chunks": self.chunks, "bytes": self.bytes })
    }
}

/// Audio chunks of a streaming synthesis
#[derive(Debug, Clone)]
pub struct SpeechStreamResult {
    queue: AsyncQueue<Vec<u8>>,
    pub metadata: CallMetadata,
}

impl SpeechStreamResult {
    /// Audio chunks from the beginning; each call replays the whole stream
    pub fn audio_stream(&self) -> impl Stream<Item = Result<Vec<u8>, AiError>> + Send + Unpin + 'static {
        self.queue.stream()
    }

    /// Resolves to the concatenated audio once the stream has finished
    pub async fn audio(&self) -> Result<Vec<u8>, AiError> {
        let mut audio = Vec::new();
        let mut chunks = self.queue.stream();
        while let Some(chunk) = chunks.next().await {
            audio.extend(chunk?);
        }
        Ok(audio)
    }
}

/// Synthesize speech while the text is still arriving.
///
/// Use [`SpeechStreamRequest::from_text`] for a text that is already
/// complete.
pub async fn stream_speech<P: Provider + ?Sized>(
    provider: &P,
    request: SpeechStreamRequest,
    options: FunctionOptions,
) -> Result<SpeechStreamResult, AiError> {
    let input = serde_json::json!({
        "model": request.model,
        "voice": request.voice,
        "format": request.format,
    });
    let ctx = CallContext::new(
        FunctionType::StreamSpeech,
        model_information(provider, &request.model),
        input,
        options,
    );

    let output = execute_stream_call(
        ctx,
        || async move { provider.stream_speech(request).await },
        AudioDeltas::default(),
    )
    .await?;

    Ok(SpeechStreamResult {
        queue: output.queue,
        metadata: output.metadata,
    })
}
