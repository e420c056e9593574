//! Text generation and streaming.

use crate::error::AiError;
use crate::event::{CallMetadata, FunctionType};
use crate::function::{model_information, FunctionOptions};
use crate::provider::Provider;
use crate::queue::AsyncQueue;
use crate::runtime::{
    execute_standard_call, execute_stream_call, CallContext, CallOutput, DeltaProcessor, Generated,
};
use crate::types::{
    ChatCompletionChunk, ChatCompletionResponse, ContentPart, TextParams, TextResult, Usage,
};
use futures::{Stream, StreamExt};

fn text_result(response: ChatCompletionResponse, trim: bool) -> Result<TextResult, AiError> {
    let first = response
        .choices
        .first()
        .ok_or_else(|| AiError::provider("No choices in response"))?;
    let finish_reason = first.finish_reason.clone();

    let tool_calls: Vec<ContentPart> = first
        .message
        .content
        .iter()
        .filter(|part| matches!(part, ContentPart::ToolCall { .. }))
        .cloned()
        .collect();

    let texts: Vec<String> = response
        .choices
        .iter()
        .map(|choice| {
            let text = choice.message.text_content();
            if trim {
                text.trim().to_string()
            } else {
                text
            }
        })
        .collect();

    Ok(TextResult {
        content: texts.first().cloned().unwrap_or_default(),
        texts,
        finish_reason,
        usage: response.usage,
        model: response.model,
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
    })
}

/// Generate text and return it with the call metadata
pub async fn generate_text_full<P: Provider + ?Sized>(
    provider: &P,
    model: &str,
    params: TextParams,
    options: FunctionOptions,
) -> Result<CallOutput<TextResult>, AiError> {
    let trim = params.trim_whitespace.unwrap_or(true);
    let input = serde_json::to_value(&params)?;
    let ctx = CallContext::new(
        FunctionType::GenerateText,
        model_information(provider, model),
        input,
        options,
    );

    execute_standard_call(ctx, || async move {
        let response = provider.chat_completion(params.into_request(model)).await?;
        let raw = response.raw.clone();
        let result = text_result(response, trim)?;
        let usage = result.usage;
        let event_value = if result.texts.len() > 1 {
            serde_json::json!(result.texts)
        } else {
            serde_json::json!(result.content)
        };
        Ok(Generated::new(result, event_value)
            .with_raw_response(raw)
            .with_usage(Some(usage)))
    })
    .await
}

/// Generate text from a chat completion.
///
/// Every choice becomes an entry of `texts`. Surrounding whitespace is
/// trimmed unless `params.trim_whitespace` is `Some(false)`.
pub async fn generate_text<P: Provider + ?Sized>(
    provider: &P,
    model: &str,
    params: TextParams,
    options: FunctionOptions,
) -> Result<TextResult, AiError> {
    Ok(generate_text_full(provider, model, params, options).await?.value)
}

/// Strips leading whitespace of the whole stream and trailing whitespace at
/// its very end. Whitespace between deltas is held back until more text
/// arrives, then published in front of it.
#[derive(Debug, Default)]
pub(crate) struct WhitespaceTrimmer {
    started: bool,
    pending: String,
}

impl WhitespaceTrimmer {
    pub(crate) fn push(&mut self, delta: &str) -> Option<String> {
        let delta = if self.started {
            delta
        } else {
            let trimmed = delta.trim_start();
            if trimmed.is_empty() {
                return None;
            }
            self.started = true;
            trimmed
        };

        let mut text = std::mem::take(&mut self.pending);
        text.push_str(delta);
        let kept = text.trim_end().len();
        self.pending = text.split_off(kept);
        (!text.is_empty()).then_some(text)
    }
}

struct TextDeltas {
    trimmer: Option<WhitespaceTrimmer>,
    text: String,
    usage: Option<Usage>,
}

impl DeltaProcessor<ChatCompletionChunk> for TextDeltas {
    type Output = String;

    fn process(&mut self, chunk: ChatCompletionChunk) -> Vec<String> {
        if let Some(usage) = chunk.usage {
            self.usage = Some(usage);
        }

        let delta = match chunk.text_delta() {
            Some(delta) if !delta.is_empty() => delta,
            _ => return Vec::new(),
        };
        let published = match &mut self.trimmer {
            Some(trimmer) => trimmer.push(delta),
            None => Some(delta.to_string()),
        };
        match published {
            Some(text) => {
                self.text.push_str(&text);
                vec![text]
            }
            None => Vec::new(),
        }
    }

    fn event_value(&self) -> serde_json::Value {
        serde_json::json!(self.text)
    }

    fn usage(&self) -> Option<Usage> {
        self.usage
    }
}

/// Text deltas of a streaming generation
#[derive(Debug, Clone)]
pub struct TextStreamResult {
    queue: AsyncQueue<String>,
    pub metadata: CallMetadata,
}

impl TextStreamResult {
    /// Text deltas from the beginning; each call replays the whole stream
    pub fn text_stream(&self) -> impl Stream<Item = Result<String, AiError>> + Send + Unpin + 'static {
        self.queue.stream()
    }

    /// Resolves to the full text once the stream has finished
    pub async fn text(&self) -> Result<String, AiError> {
        let mut text = String::new();
        let mut deltas = self.queue.stream();
        while let Some(delta) = deltas.next().await {
            text.push_str(&delta?);
        }
        Ok(text)
    }
}

/// Stream text deltas from a chat completion.
///
/// The `finished` event carries the full text. Whitespace handling follows
/// `params.trim_whitespace` like [`generate_text`].
pub async fn stream_text<P: Provider + ?Sized>(
    provider: &P,
    model: &str,
    params: TextParams,
    options: FunctionOptions,
) -> Result<TextStreamResult, AiError> {
    let trim = params.trim_whitespace.unwrap_or(true);
    let input = serde_json::to_value(&params)?;
    let ctx = CallContext::new(
        FunctionType::StreamText,
        model_information(provider, model),
        input,
        options,
    );

    let processor = TextDeltas {
        trimmer: trim.then(WhitespaceTrimmer::default),
        text: String::new(),
        usage: None,
    };

    let output = execute_stream_call(
        ctx,
        || async move {
            let request = params.into_request(model).with_stream(true);
            provider.stream_chat_completion(request).await
        },
        processor,
    )
    .await?;

    Ok(TextStreamResult {
        queue: output.queue,
        metadata: output.metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trim_all(deltas: &[&str]) -> Vec<String> {
        let mut trimmer = WhitespaceTrimmer::default();
        deltas.iter().filter_map(|d| trimmer.push(d)).collect()
    }

    #[test]
    fn test_trimmer_strips_stream_edges() {
        assert_eq!(
            trim_all(&["\n\n", "  Hello", " ", "world", "  \n"]),
            vec!["Hello", " world"]
        );
    }

    #[test]
    fn test_trimmer_keeps_inner_whitespace() {
        assert_eq!(trim_all(&["a ", " b", "\nc"]), vec!["a", "  b", "\nc"]);
        assert!(trim_all(&["   ", "\t"]).is_empty());
    }
}
