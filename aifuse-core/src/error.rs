//! Error types for aifuse operations.

use std::fmt;
use std::time::Duration;

/// The main error type for aifuse operations.
///
/// Every variant is `Clone` so that errors can be replayed to all consumers
/// of an [`AsyncQueue`](crate::queue::AsyncQueue) and kept in a
/// [`RetryError`] attempt list.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AiError {
    /// Failed HTTP call to a provider API
    #[error(transparent)]
    ApiCall(#[from] ApiCallError),

    /// Retries were exhausted or stopped on a non-retryable error
    #[error(transparent)]
    Retry(#[from] RetryError),

    /// A value did not match its schema
    #[error("Type validation failed: {message}")]
    TypeValidation {
        value: serde_json::Value,
        message: String,
    },

    /// Text could not be parsed as JSON
    #[error("JSON parsing failed: {message}")]
    JsonParse { text: String, message: String },

    /// Generated object text was not valid JSON
    #[error("Object parsing failed: {message}")]
    ObjectParse { value_text: String, message: String },

    /// Generated object did not match the requested schema
    #[error("Object validation failed: {message}")]
    ObjectValidation {
        value_text: String,
        value: serde_json::Value,
        message: String,
    },

    /// The call was aborted through its abort signal
    #[error("Aborted")]
    Aborted,

    /// API key could not be resolved
    #[error("Failed to load API key: {0}")]
    LoadApiKey(String),

    /// Provider-specific errors
    #[error("Provider error: {0}")]
    Provider(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Rate limit errors
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    /// Invalid request errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Timeout errors
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Layer errors
    #[error("Layer error ({layer}): {message}")]
    Layer { layer: String, message: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Stream errors
    #[error("Stream error: {0}")]
    Stream(String),

    /// Unsupported operation errors
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Generic errors
    #[error("Error: {0}")]
    Other(String),
}

impl AiError {
    /// Create a provider error
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Create an authentication error
    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limit(msg: impl Into<String>) -> Self {
        Self::RateLimit(msg.into())
    }

    /// Create an invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a layer error
    pub fn layer(layer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Layer {
            layer: layer.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a stream error
    pub fn stream(msg: impl Into<String>) -> Self {
        Self::Stream(msg.into())
    }

    /// Create an unsupported operation error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Create a type validation error
    pub fn type_validation(value: serde_json::Value, message: impl Into<String>) -> Self {
        Self::TypeValidation {
            value,
            message: message.into(),
        }
    }

    /// Create a JSON parse error
    pub fn json_parse(text: impl Into<String>, message: impl Into<String>) -> Self {
        Self::JsonParse {
            text: text.into(),
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Check if this is a retryable error
    pub fn is_retryable(&self) -> bool {
        match self {
            AiError::ApiCall(e) => e.is_retryable,
            AiError::Timeout(_) | AiError::RateLimit(_) => true,
            _ => false,
        }
    }

    /// Check if this error stems from an aborted call
    pub fn is_abort(&self) -> bool {
        matches!(self, AiError::Aborted)
    }

    /// Server-provided minimum wait before the next attempt, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            AiError::ApiCall(e) => e.retry_after,
            _ => None,
        }
    }
}

impl From<serde_json::Error> for AiError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for AiError {
    fn from(e: reqwest::Error) -> Self {
        let mut error = ApiCallError::new(
            "Cannot connect to API",
            e.url().map(|u| u.to_string()).unwrap_or_default(),
            serde_json::Value::Null,
        )
        .with_cause(e.to_string());
        if let Some(status) = e.status() {
            error = error.with_status(status.as_u16());
        } else {
            error.is_retryable = e.is_timeout() || e.is_connect() || e.is_request();
        }
        Self::ApiCall(error)
    }
}

impl From<String> for AiError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<&str> for AiError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

/// A failed call to a provider HTTP API.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ApiCallError {
    pub message: String,
    pub url: String,
    pub request_body: serde_json::Value,
    pub status_code: Option<u16>,
    pub response_body: Option<String>,
    pub cause: Option<String>,
    pub is_retryable: bool,
    pub retry_after: Option<Duration>,
}

impl ApiCallError {
    /// Create an error without a status code.
    ///
    /// Errors without a status never reached the server and are retryable.
    pub fn new(
        message: impl Into<String>,
        url: impl Into<String>,
        request_body: serde_json::Value,
    ) -> Self {
        Self {
            message: message.into(),
            url: url.into(),
            request_body,
            status_code: None,
            response_body: None,
            cause: None,
            is_retryable: true,
            retry_after: None,
        }
    }

    /// Set the HTTP status; resets retryability to the status default
    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self.is_retryable = Self::default_retryable(status_code);
        self
    }

    pub fn with_response_body(mut self, body: impl Into<String>) -> Self {
        self.response_body = Some(body.into());
        self
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn with_retryable(mut self, is_retryable: bool) -> Self {
        self.is_retryable = is_retryable;
        self
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    /// 429 and 5xx are retryable
    pub fn default_retryable(status_code: u16) -> bool {
        status_code == 429 || status_code >= 500
    }
}

/// Why a retry loop gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryErrorReason {
    MaxTriesExceeded,
    ErrorNotRetryable,
}

impl fmt::Display for RetryErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryErrorReason::MaxTriesExceeded => f.write_str("maxTriesExceeded"),
            RetryErrorReason::ErrorNotRetryable => f.write_str("errorNotRetryable"),
        }
    }
}

/// Error returned once a retry loop stops, with every attempt's error.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct RetryError {
    pub message: String,
    pub reason: RetryErrorReason,
    pub errors: Vec<AiError>,
}

impl RetryError {
    pub fn max_tries_exceeded(errors: Vec<AiError>) -> Self {
        let last = errors.last().map(|e| e.to_string()).unwrap_or_default();
        Self {
            message: format!("Failed after {} tries. Last error: {}", errors.len(), last),
            reason: RetryErrorReason::MaxTriesExceeded,
            errors,
        }
    }

    pub fn not_retryable(errors: Vec<AiError>) -> Self {
        let last = errors.last().map(|e| e.to_string()).unwrap_or_default();
        Self {
            message: format!(
                "Failed after {} attempts with non-retryable error: '{}'",
                errors.len(),
                last
            ),
            reason: RetryErrorReason::ErrorNotRetryable,
            errors,
        }
    }

    /// Error of the final attempt
    pub fn last_error(&self) -> Option<&AiError> {
        self.errors.last()
    }
}
