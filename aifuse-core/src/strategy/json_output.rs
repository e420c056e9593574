//! JSON output strategies.
//!
//! Providers differ in how they can be asked for structured output:
//! - [`JsonSchemaStrategy`]: the API accepts a JSON schema response format
//! - [`JsonModeStrategy`]: the API only has a JSON object mode, so the schema
//!   goes into the prompt

use crate::error::AiError;
use crate::types::{ChatCompletionRequest, ContentPart, Message, ResponseFormat, Role};

/// Prepares a chat completion request so the model answers with JSON
/// matching a schema.
pub trait JsonOutputStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Modify `req` to request JSON output for `schema`
    fn apply(
        &self,
        req: &mut ChatCompletionRequest,
        schema: &serde_json::Value,
    ) -> Result<(), AiError>;
}

/// Sets a `json_schema` response format.
#[derive(Debug, Clone)]
pub struct JsonSchemaStrategy {
    /// Name reported to the API for the schema
    pub schema_name: String,
    pub strict: bool,
}

impl JsonSchemaStrategy {
    pub fn new() -> Self {
        Self {
            schema_name: "response".to_string(),
            strict: true,
        }
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_schema_name(mut self, name: impl Into<String>) -> Self {
        self.schema_name = name.into();
        self
    }
}

impl Default for JsonSchemaStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonOutputStrategy for JsonSchemaStrategy {
    fn name(&self) -> &str {
        "JsonSchemaStrategy"
    }

    fn apply(
        &self,
        req: &mut ChatCompletionRequest,
        schema: &serde_json::Value,
    ) -> Result<(), AiError> {
        req.response_format = Some(ResponseFormat::JsonSchema {
            name: self.schema_name.clone(),
            schema: schema.clone(),
            strict: self.strict,
        });
        Ok(())
    }
}

/// Where [`JsonModeStrategy`] puts the schema instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstructionPlacement {
    /// New system message in front of the conversation
    #[default]
    SystemMessage,
    /// Appended to the last user message
    LastUserMessage,
}

/// Sets the `json_object` response format and describes the schema in the
/// prompt.
#[derive(Debug, Clone, Default)]
pub struct JsonModeStrategy {
    pub placement: InstructionPlacement,
}

impl JsonModeStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_placement(placement: InstructionPlacement) -> Self {
        Self { placement }
    }

    fn instruction(schema: &serde_json::Value) -> Result<String, AiError> {
        let schema = serde_json::to_string_pretty(schema)?;
        Ok(format!(
            "Answer with a single JSON value that conforms to this JSON schema:\n{}\n\
             Do not add explanations or markdown fences.",
            schema
        ))
    }
}

impl JsonOutputStrategy for JsonModeStrategy {
    fn name(&self) -> &str {
        "JsonModeStrategy"
    }

    fn apply(
        &self,
        req: &mut ChatCompletionRequest,
        schema: &serde_json::Value,
    ) -> Result<(), AiError> {
        req.response_format = Some(ResponseFormat::JsonObject);
        let instruction = Self::instruction(schema)?;

        match self.placement {
            InstructionPlacement::SystemMessage => {
                req.messages.insert(0, Message::system(instruction));
            }
            InstructionPlacement::LastUserMessage => {
                match req.messages.iter_mut().rev().find(|m| m.role == Role::User) {
                    Some(message) => message.content.push(ContentPart::Text {
                        text: format!("\n\n{}", instruction),
                    }),
                    None => req.messages.push(Message::user(instruction)),
                }
            }
        }

        Ok(())
    }
}

/// Strategy for a provider id: schema response formats where the vendor
/// API has them, JSON mode otherwise.
pub fn detect_json_strategy(provider_id: &str) -> Box<dyn JsonOutputStrategy> {
    match provider_id {
        "openai" | "azure-openai" | "anthropic" | "mistral" => Box::new(JsonSchemaStrategy::new()),
        _ => Box::new(JsonModeStrategy::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {"city": {"type": "string"}},
            "required": ["city"]
        })
    }

    #[test]
    fn test_schema_strategy_sets_response_format() {
        let mut req = ChatCompletionRequest::new("m", vec![Message::user("where?")]);
        JsonSchemaStrategy::new()
            .with_strict(false)
            .with_schema_name("place")
            .apply(&mut req, &schema())
            .unwrap();

        assert_eq!(
            req.response_format,
            Some(ResponseFormat::JsonSchema {
                name: "place".into(),
                schema: schema(),
                strict: false,
            })
        );
        assert_eq!(req.messages.len(), 1);
    }

    #[test]
    fn test_json_mode_system_message() {
        let mut req = ChatCompletionRequest::new("m", vec![Message::user("where?")]);
        JsonModeStrategy::new().apply(&mut req, &schema()).unwrap();

        assert_eq!(req.response_format, Some(ResponseFormat::JsonObject));
        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[0].role, Role::System);
        assert!(req.messages[0].text_content().contains("\"city\""));
    }

    #[test]
    fn test_json_mode_last_user_message() {
        let mut req = ChatCompletionRequest::new(
            "m",
            vec![
                Message::user("first"),
                Message::assistant("ok"),
                Message::user("second"),
            ],
        );
        JsonModeStrategy::with_placement(InstructionPlacement::LastUserMessage)
            .apply(&mut req, &schema())
            .unwrap();

        assert_eq!(req.messages.len(), 3);
        assert_eq!(req.messages[0].text_content(), "first");
        assert!(req.messages[2].text_content().starts_with("second"));
        assert!(req.messages[2].text_content().contains("JSON schema"));

        let mut empty = ChatCompletionRequest::new("m", vec![]);
        JsonModeStrategy::with_placement(InstructionPlacement::LastUserMessage)
            .apply(&mut empty, &schema())
            .unwrap();
        assert_eq!(empty.messages.len(), 1);
        assert_eq!(empty.messages[0].role, Role::User);
    }

    #[test]
    fn test_detect_json_strategy() {
        assert_eq!(detect_json_strategy("openai").name(), "JsonSchemaStrategy");
        assert_eq!(detect_json_strategy("ollama").name(), "JsonModeStrategy");
        assert_eq!(detect_json_strategy("mock").name(), "JsonModeStrategy");
    }
}
