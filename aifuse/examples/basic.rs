//! Basic usage example using the aifuse meta crate.
//!
//! This demonstrates:
//! 1. Implementing a provider (a local echo model, no network needed)
//! 2. Composing it with retry, throttle, cache and logging layers
//! 3. Text generation with an observer recording every call
//! 4. Typed object generation with a schema derived by schemars
//! 5. Batched embeddings and cosine similarity
//!
//! Set `AIFUSE_LOG_FORMAT=basic-text` to log every function event.

use aifuse::function::cosine_similarity;
use aifuse::prelude::*;
use aifuse::schemars::JsonSchema;
use aifuse::{
    schema_of, ChatCompletionRequest, ChatCompletionResponse, Choice, EmbeddingRequest,
    EmbeddingResponse, FinishReason, ObjectParams, ProviderInfo, ResponseFormat,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Answers locally: echoes prompts and fills JSON schemas with fixed data.
#[derive(Debug)]
struct EchoProvider {
    info: Arc<ProviderInfo>,
}

impl EchoProvider {
    fn new() -> Self {
        Self {
            info: Arc::new(ProviderInfo::new("echo", "Echo")),
        }
    }
}

#[async_trait]
impl Provider for EchoProvider {
    fn info(&self) -> Arc<ProviderInfo> {
        self.info.clone()
    }

    fn capabilities(&self) -> Vec<aifuse::Capability> {
        vec![aifuse::Capability::TextGeneration, aifuse::Capability::Embedding]
    }

    async fn chat_completion(
        &self,
        req: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse> {
        let prompt = req
            .messages
            .iter()
            .rev()
            .find(|message| message.role == Role::User)
            .map(|message| message.text_content())
            .unwrap_or_default();

        let answer = match &req.response_format {
            Some(ResponseFormat::JsonSchema { .. } | ResponseFormat::JsonObject) => {
                serde_json::json!({
                    "name": "Ferris",
                    "age": 9,
                    "occupation": "Mascot",
                    "hobbies": ["borrow checking", "swimming"]
                })
                .to_string()
            }
            _ => format!("  You said: {}  ", prompt),
        };

        let usage = Usage::new(prompt.split_whitespace().count() as u32, 4);
        Ok(ChatCompletionResponse {
            id: "echo-1".to_string(),
            model: req.model,
            choices: vec![Choice {
                index: 0,
                message: Message::assistant(answer),
                finish_reason: FinishReason::Stop,
            }],
            usage,
            created: None,
            raw: None,
        })
    }

    async fn embed(&self, req: EmbeddingRequest) -> Result<EmbeddingResponse> {
        // Letter counts for a few vowels
        let embeddings = req
            .values
            .iter()
            .map(|value| {
                "aeiou"
                    .chars()
                    .map(|vowel| value.chars().filter(|c| *c == vowel).count() as f32)
                    .collect()
            })
            .collect();
        Ok(EmbeddingResponse {
            embeddings,
            usage: None,
            raw: None,
        })
    }

    fn max_values_per_embedding_call(&self) -> Option<usize> {
        Some(2)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct PersonInfo {
    /// Full name of the person
    name: String,
    /// Age in years
    age: u32,
    /// Current occupation or job title
    occupation: String,
    /// List of hobbies
    hobbies: Vec<String>,
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let usage = Arc::new(UsageTracker::new());
    let recorder = Arc::new(EventRecorder::new());

    let executor = RuntimeExecutor::builder(EchoProvider::new())
        .layer(CacheLayer::new())
        .layer(RetryLayer::new().with_max_tries(3))
        .layer(ThrottleLayer::max_concurrency(4)?)
        .layer(LoggingLayer::new())
        .observer(usage.clone())
        .observer(recorder.clone())
        .finish();

    println!("=== Example 1: Text generation ===");
    let result = executor
        .generate_text(
            "echo-small",
            TextParams::prompt("What is Rust?"),
            FunctionOptions::new().with_function_id("intro"),
        )
        .await?;
    println!("Answer: {:?}", result.content);

    println!("\n=== Example 2: Structured output ===");
    let person = executor
        .generate_object(
            "echo-small",
            ObjectParams::new(vec![Message::user("Describe Ferris the crab")]),
            &schema_of::<PersonInfo>(),
            FunctionOptions::new(),
        )
        .await?;
    println!("Person: {:#?}", person.object);

    println!("\n=== Example 3: Embeddings ===");
    let values = ["banana", "papaya", "kiwi"]
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>();
    let embeddings = executor
        .embed_many("echo-embed", values.clone(), FunctionOptions::new())
        .await?;
    for (value, embedding) in values.iter().zip(&embeddings.embeddings) {
        println!("{value}: {embedding:?}");
    }
    println!(
        "similarity(banana, papaya) = {:.3}",
        cosine_similarity(&embeddings.embeddings[0], &embeddings.embeddings[1])?
    );

    println!("\n=== Example 4: Runs ===");
    let run = Arc::new(Run::new().with_session_id("demo-session"));
    for question in ["first", "second"] {
        executor
            .generate_text(
                "echo-small",
                TextParams::prompt(question),
                FunctionOptions::new().with_run(run.clone()),
            )
            .await?;
    }
    println!("Run {} saw {} events", run.run_id(), run.events().len());

    let total = usage.total();
    println!(
        "\nCalls: {} ({} failed), tokens: {}",
        total.calls, total.failed_calls, total.usage.total_tokens
    );
    println!("Recorded events: {}", recorder.len());

    Ok(())
}
