//! Function-call loggers that render events through `tracing`.

use crate::config::LogFormat;
use crate::error::AiError;
use crate::event::{EventType, FunctionEvent, FunctionObserver, FunctionResult};
use async_trait::async_trait;
use std::sync::Arc;

/// Observer that logs every event in the given format.
#[derive(Debug, Clone, Copy)]
pub struct FunctionCallLogger {
    format: LogFormat,
}

impl FunctionCallLogger {
    pub fn new(format: LogFormat) -> Self {
        Self { format }
    }

    /// Logger observers for `format`; empty when logging is off
    pub fn observers_for(format: LogFormat) -> Vec<Arc<dyn FunctionObserver>> {
        match format {
            LogFormat::Off => Vec::new(),
            format => vec![Arc::new(Self::new(format))],
        }
    }

    /// `[timestamp] call-id - function-type started|finished in Nms`
    pub fn basic_text(event: &FunctionEvent) -> String {
        let metadata = &event.metadata;
        match event.event_type {
            EventType::Started => format!(
                "[{}] {} - {} started",
                metadata.start_timestamp.to_rfc3339(),
                metadata.call_id,
                metadata.function_type
            ),
            EventType::Finished => {
                let outcome = match &event.result {
                    Some(FunctionResult::Error { .. }) => " with error",
                    Some(FunctionResult::Abort) => " (aborted)",
                    _ => "",
                };
                format!(
                    "[{}] {} - {} finished in {}ms{}",
                    event
                        .finish_timestamp
                        .unwrap_or(metadata.start_timestamp)
                        .to_rfc3339(),
                    metadata.call_id,
                    metadata.function_type,
                    event.duration_ms.unwrap_or_default(),
                    outcome
                )
            }
        }
    }
}

#[async_trait]
impl FunctionObserver for FunctionCallLogger {
    async fn on_function_event(&self, event: &FunctionEvent) -> Result<(), AiError> {
        match self.format {
            LogFormat::Off => {}
            LogFormat::BasicText => {
                tracing::info!("{}", Self::basic_text(event));
            }
            LogFormat::DetailedObject => {
                let metadata = &event.metadata;
                let input = metadata.input.to_string();
                tracing::info!(
                    event_type = ?event.event_type,
                    function_type = %metadata.function_type,
                    call_id = %metadata.call_id,
                    run_id = metadata.run_id.as_deref().unwrap_or(""),
                    function_id = metadata.function_id.as_deref().unwrap_or(""),
                    model = %metadata.model,
                    input = %input,
                    duration_ms = event.duration_ms,
                    result = ?event.result,
                    "function event"
                );
            }
            LogFormat::DetailedJson => {
                let json = serde_json::to_string(event)?;
                tracing::info!("{}", json);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{new_call_id, CallMetadata, FunctionType};
    use crate::types::ModelInformation;

    fn metadata() -> CallMetadata {
        CallMetadata {
            function_type: FunctionType::GenerateText,
            call_id: new_call_id(),
            parent_call_id: None,
            run_id: None,
            session_id: None,
            user_id: None,
            function_id: None,
            model: ModelInformation::new("mock", "m"),
            input: serde_json::Value::Null,
            start_timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_basic_text_lines() {
        let started = FunctionEvent::started(metadata());
        let line = FunctionCallLogger::basic_text(&started);
        assert!(line.ends_with("generate-text started"));
        assert!(line.contains(started.call_id()));

        let failed = FunctionEvent::finished(
            metadata(),
            FunctionResult::Error {
                error: "boom".into(),
            },
        );
        let line = FunctionCallLogger::basic_text(&failed);
        assert!(line.contains("generate-text finished in"));
        assert!(line.ends_with("with error"));
    }

    #[test]
    fn test_off_has_no_observers() {
        assert!(FunctionCallLogger::observers_for(LogFormat::Off).is_empty());
        assert_eq!(FunctionCallLogger::observers_for(LogFormat::DetailedJson).len(), 1);
    }
}
