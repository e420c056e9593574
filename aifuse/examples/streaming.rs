//! Streaming example.
//!
//! A local provider streams a reply word by word. The example shows:
//! 1. Reading text deltas as they arrive
//! 2. Replaying the same stream to a second reader
//! 3. Aborting a stream through an `AbortSignal`
//! 4. Observing stream calls through a channel

use aifuse::prelude::*;
use aifuse::provider::ChatCompletionStream;
use aifuse::{
    ChatCompletionChunk, ChatCompletionRequest, ChoiceDelta, FinishReason, MessageDelta,
    ProviderInfo,
};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
struct WordStreamProvider {
    info: Arc<ProviderInfo>,
    delay: Duration,
}

#[async_trait]
impl Provider for WordStreamProvider {
    fn info(&self) -> Arc<ProviderInfo> {
        self.info.clone()
    }

    fn capabilities(&self) -> Vec<aifuse::Capability> {
        vec![aifuse::Capability::TextStreaming]
    }

    async fn stream_chat_completion(
        &self,
        req: ChatCompletionRequest,
    ) -> Result<Box<ChatCompletionStream>> {
        let prompt = req
            .messages
            .last()
            .map(|message| message.text_content())
            .unwrap_or_default();
        let reply = format!("\n  Streaming back your prompt: {} ", prompt);

        let words: Vec<String> = reply.split_inclusive(' ').map(str::to_string).collect();
        let last = words.len().saturating_sub(1);
        let model = req.model;
        let delay = self.delay;

        let stream = futures::stream::iter(words.into_iter().enumerate()).then(move |(i, word)| {
            let model = model.clone();
            async move {
                tokio::time::sleep(delay).await;
                Ok::<_, AiError>(ChatCompletionChunk {
                    id: "words-1".to_string(),
                    model,
                    choices: vec![ChoiceDelta {
                        index: 0,
                        delta: MessageDelta {
                            content: Some(word),
                            ..Default::default()
                        },
                        finish_reason: (i == last).then_some(FinishReason::Stop),
                    }],
                    usage: (i == last).then(|| Usage::new(5, last as u32 + 1)),
                })
            }
        });
        Ok(Box::new(Box::pin(stream)))
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let (events, mut receiver) = ChannelObserver::new();
    let printer = tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            println!(
                "[event] {:?} {} {}",
                event.event_type,
                event.function_type(),
                event.call_id()
            );
        }
    });

    let provider = WordStreamProvider {
        info: Arc::new(ProviderInfo::new("words", "Word Stream")),
        delay: Duration::from_millis(50),
    };
    let executor = RuntimeExecutor::builder(provider)
        .layer(LoggingLayer::new())
        .observer(Arc::new(events))
        .finish();

    println!("=== Example 1: Live deltas ===");
    let result = executor
        .stream_text(
            "words-v1",
            TextParams::prompt("hello streaming world"),
            FunctionOptions::new(),
        )
        .await?;
    let mut deltas = result.text_stream();
    while let Some(delta) = deltas.next().await {
        print!("{}", delta?);
    }
    println!();

    println!("\n=== Example 2: Replay ===");
    // A finished stream can still be read from the start
    println!("Full text: {:?}", result.text().await?);

    println!("\n=== Example 3: Abort ===");
    let abort = AbortSignal::new();
    let result = executor
        .stream_text(
            "words-v1",
            TextParams::prompt("this reply will be cut short"),
            FunctionOptions::new().with_abort_signal(abort.clone()),
        )
        .await?;
    let mut deltas = result.text_stream();
    let mut received = 0;
    while let Some(delta) = deltas.next().await {
        match delta {
            Ok(text) => {
                print!("{}", text);
                received += 1;
                if received == 3 {
                    abort.abort();
                }
            }
            Err(e) => {
                println!("\nStream ended: {}", e);
                break;
            }
        }
    }

    drop(executor);
    printer.await?;
    Ok(())
}
