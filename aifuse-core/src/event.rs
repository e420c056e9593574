//! Function lifecycle events and the observers that receive them.

use crate::error::AiError;
use crate::types::{ModelInformation, Usage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::sync::Arc;

/// Which convenience function produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FunctionType {
    GenerateText,
    StreamText,
    GenerateObject,
    Embed,
    GenerateSpeech,
    StreamSpeech,
    GenerateTranscription,
    GenerateImage,
}

impl FunctionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FunctionType::GenerateText => "generate-text",
            FunctionType::StreamText => "stream-text",
            FunctionType::GenerateObject => "generate-object",
            FunctionType::Embed => "embed",
            FunctionType::GenerateSpeech => "generate-speech",
            FunctionType::StreamSpeech => "stream-speech",
            FunctionType::GenerateTranscription => "generate-transcription",
            FunctionType::GenerateImage => "generate-image",
        }
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Started,
    Finished,
}

/// Outcome attached to a `finished` event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FunctionResult {
    Success {
        #[serde(skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
        value: serde_json::Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        raw_response: Option<serde_json::Value>,
    },
    Error {
        error: String,
    },
    Abort,
}

/// Ids and context shared by the `started` and `finished` events of a call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallMetadata {
    pub function_type: FunctionType,
    pub call_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_id: Option<String>,
    pub model: ModelInformation,
    pub input: serde_json::Value,
    pub start_timestamp: DateTime<Utc>,
}

/// Create a fresh call id
pub fn new_call_id() -> String {
    format!("call-{}", uuid::Uuid::new_v4())
}

/// A function lifecycle event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionEvent {
    pub event_type: EventType,
    #[serde(flatten)]
    pub metadata: CallMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<FunctionResult>,
}

impl FunctionEvent {
    pub fn started(metadata: CallMetadata) -> Self {
        Self {
            event_type: EventType::Started,
            metadata,
            finish_timestamp: None,
            duration_ms: None,
            result: None,
        }
    }

    pub fn finished(metadata: CallMetadata, result: FunctionResult) -> Self {
        let finish = Utc::now();
        let duration_ms = (finish - metadata.start_timestamp)
            .num_milliseconds()
            .max(0) as u64;
        Self {
            event_type: EventType::Finished,
            metadata,
            finish_timestamp: Some(finish),
            duration_ms: Some(duration_ms),
            result: Some(result),
        }
    }

    pub fn call_id(&self) -> &str {
        &self.metadata.call_id
    }

    pub fn function_type(&self) -> FunctionType {
        self.metadata.function_type
    }

    pub fn is_success(&self) -> bool {
        matches!(self.result, Some(FunctionResult::Success { .. }))
    }
}

/// Receiver of function lifecycle events.
///
/// Observer errors never fail the observed call; they are handed to the
/// event source's error handler.
#[async_trait]
pub trait FunctionObserver: Send + Sync + Debug + 'static {
    async fn on_function_event(&self, event: &FunctionEvent) -> Result<(), AiError>;
}

/// Callback for observer failures
pub type ErrorHandler = Arc<dyn Fn(&AiError) + Send + Sync>;

/// Fans events out to a fixed set of observers.
#[derive(Clone)]
pub struct FunctionEventSource {
    observers: Vec<Arc<dyn FunctionObserver>>,
    error_handler: Option<ErrorHandler>,
}

impl Debug for FunctionEventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionEventSource")
            .field("observers", &self.observers)
            .field("custom_error_handler", &self.error_handler.is_some())
            .finish()
    }
}

impl FunctionEventSource {
    pub fn new(observers: Vec<Arc<dyn FunctionObserver>>, error_handler: Option<ErrorHandler>) -> Self {
        Self {
            observers,
            error_handler,
        }
    }

    pub fn observers(&self) -> &[Arc<dyn FunctionObserver>] {
        &self.observers
    }

    /// Deliver `event` to every observer concurrently
    pub async fn notify(&self, event: &FunctionEvent) {
        let futures = self
            .observers
            .iter()
            .map(|observer| observer.on_function_event(event))
            .collect::<Vec<_>>();

        for result in futures::future::join_all(futures).await {
            if let Err(error) = result {
                match &self.error_handler {
                    Some(handler) => handler(&error),
                    None => tracing::error!(
                        call_id = %event.call_id(),
                        error = %error,
                        "Function observer failed"
                    ),
                }
            }
        }
    }
}
