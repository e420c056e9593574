//! Speech-to-text.

use crate::error::AiError;
use crate::event::FunctionType;
use crate::function::{model_information, FunctionOptions};
use crate::provider::Provider;
use crate::runtime::{execute_standard_call, CallContext, Generated};
use crate::types::{TranscriptionRequest, TranscriptionResponse};

/// Transcribe audio. The event input records the audio size, not its bytes.
pub async fn generate_transcription<P: Provider + ?Sized>(
    provider: &P,
    request: TranscriptionRequest,
    options: FunctionOptions,
) -> Result<TranscriptionResponse, AiError> {
    let input = serde_json::json!({
        "model": request.model,
        "mime_type": request.mime_type,
        "language": request.language,
        "audio_bytes": request.audio.len(),
    });
    let ctx = CallContext::new(
        FunctionType::GenerateTranscription,
        model_information(provider, &request.model),
        input,
        options,
    );

    let output = execute_standard_call(ctx, || async move {
        let response = provider.transcribe(request).await?;
        let event_value = serde_json::json!(response.text);
        let raw = response.raw.clone();
        Ok(Generated::new(response, event_value).with_raw_response(raw))
    })
    .await?;

    Ok(output.value)
}

/// Alias of [`generate_transcription`]
pub async fn transcribe<P: Provider + ?Sized>(
    provider: &P,
    request: TranscriptionRequest,
    options: FunctionOptions,
) -> Result<TranscriptionResponse, AiError> {
    generate_transcription(provider, request, options).await
}
