//! POST helpers and response handlers for provider HTTP APIs.

use crate::error::{ApiCallError, AiError};
use crate::schema::{parse_json, Schema};
use async_trait::async_trait;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// Request details handed to response handlers for error reporting
#[derive(Debug, Clone)]
pub struct ResponseContext {
    pub url: String,
    pub request_body: serde_json::Value,
}

/// Turns a successful (2xx) response into a value
#[async_trait]
pub trait ResponseHandler<T>: Send + Sync {
    async fn handle(&self, ctx: &ResponseContext, response: reqwest::Response) -> Result<T, AiError>;
}

/// Turns a failed (non-2xx) response into an error
#[async_trait]
pub trait FailedResponseHandler: Send + Sync {
    async fn handle(&self, ctx: &ResponseContext, response: reqwest::Response) -> AiError;
}

/// Request body variants
#[derive(Debug, Clone)]
pub enum ApiBody {
    Json(serde_json::Value),
    Bytes {
        content: Vec<u8>,
        content_type: String,
    },
}

/// Seconds from a `Retry-After` header
fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// POST a JSON body
pub async fn post_json_to_api<T, S, F>(
    client: &reqwest::Client,
    url: &str,
    headers: &HashMap<String, String>,
    body: &serde_json::Value,
    success: &S,
    failure: &F,
) -> Result<T, AiError>
where
    S: ResponseHandler<T> + ?Sized,
    F: FailedResponseHandler + ?Sized,
{
    post_to_api(
        client,
        url,
        headers,
        ApiBody::Json(body.clone()),
        body.clone(),
        success,
        failure,
    )
    .await
}

/// POST `body` and dispatch the response to `success` or `failure`.
///
/// `request_values` is what error reports show as the request body (for
/// binary uploads, typically the non-binary parameters).
pub async fn post_to_api<T, S, F>(
    client: &reqwest::Client,
    url: &str,
    headers: &HashMap<String, String>,
    body: ApiBody,
    request_values: serde_json::Value,
    success: &S,
    failure: &F,
) -> Result<T, AiError>
where
    S: ResponseHandler<T> + ?Sized,
    F: FailedResponseHandler + ?Sized,
{
    let ctx = ResponseContext {
        url: url.to_string(),
        request_body: request_values,
    };

    let mut request = client.post(url);
    for (name, value) in headers {
        request = request.header(name.as_str(), value.as_str());
    }
    request = match body {
        ApiBody::Json(json) => request.json(&json),
        ApiBody::Bytes {
            content,
            content_type,
        } => request
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(content),
    };

    let response = request.send().await.map_err(|e| {
        AiError::from(
            ApiCallError::new("Cannot connect to API", url, ctx.request_body.clone())
                .with_cause(e.to_string()),
        )
    })?;

    if !response.status().is_success() {
        let wait = retry_after(&response);
        let mut error = failure.handle(&ctx, response).await;
        if let (AiError::ApiCall(api_error), Some(wait)) = (&mut error, wait) {
            api_error.retry_after = Some(wait);
        }
        tracing::debug!(url = %url, error = %error, "API call failed");
        return Err(error);
    }

    let status = response.status().as_u16();
    success.handle(&ctx, response).await.map_err(|e| match e {
        AiError::ApiCall(_) => e,
        other => ApiCallError::new("Failed to process successful response", url, ctx.request_body.clone())
            .with_status(status)
            .with_cause(other.to_string())
            .with_retryable(false)
            .into(),
    })
}

async fn read_body(ctx: &ResponseContext, response: reqwest::Response) -> Result<(u16, String), AiError> {
    let status = response.status().as_u16();
    let text = response.text().await.map_err(|e| {
        AiError::from(
            ApiCallError::new("Failed to read response body", &ctx.url, ctx.request_body.clone())
                .with_status(status)
                .with_cause(e.to_string()),
        )
    })?;
    Ok((status, text))
}

// ============================================================================
// Success handlers
// ============================================================================

/// Parses the body as JSON and validates it with a schema
pub struct JsonResponseHandler<T, S> {
    schema: S,
    _marker: PhantomData<fn() -> T>,
}

impl<T, S: Schema<T>> JsonResponseHandler<T, S> {
    pub fn new(schema: S) -> Self {
        Self {
            schema,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T, S> ResponseHandler<T> for JsonResponseHandler<T, S>
where
    T: Send,
    S: Schema<T>,
{
    async fn handle(&self, ctx: &ResponseContext, response: reqwest::Response) -> Result<T, AiError> {
        let (status, text) = read_body(ctx, response).await?;
        let value = parse_json(&text).and_then(|value| self.schema.validate(&value));
        value.map_err(|e| {
            ApiCallError::new("Invalid JSON response", &ctx.url, ctx.request_body.clone())
                .with_status(status)
                .with_response_body(text)
                .with_cause(e.to_string())
                .with_retryable(false)
                .into()
        })
    }
}

/// Returns the body as text
#[derive(Debug, Clone, Copy, Default)]
pub struct TextResponseHandler;

#[async_trait]
impl ResponseHandler<String> for TextResponseHandler {
    async fn handle(&self, ctx: &ResponseContext, response: reqwest::Response) -> Result<String, AiError> {
        Ok(read_body(ctx, response).await?.1)
    }
}

/// Returns the body as raw bytes (audio, images)
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesResponseHandler;

#[async_trait]
impl ResponseHandler<Vec<u8>> for BytesResponseHandler {
    async fn handle(&self, ctx: &ResponseContext, response: reqwest::Response) -> Result<Vec<u8>, AiError> {
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(|e| {
            AiError::from(
                ApiCallError::new("Failed to read response body", &ctx.url, ctx.request_body.clone())
                    .with_status(status)
                    .with_cause(e.to_string()),
            )
        })?;
        Ok(bytes.to_vec())
    }
}

/// Hands the streaming response through untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct RawResponseHandler;

#[async_trait]
impl ResponseHandler<reqwest::Response> for RawResponseHandler {
    async fn handle(
        &self,
        _ctx: &ResponseContext,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, AiError> {
        Ok(response)
    }
}

// ============================================================================
// Failure handlers
// ============================================================================

type RetryablePredicate = Arc<dyn Fn(u16, &serde_json::Value) -> bool + Send + Sync>;

/// Extracts a message from a JSON error body (`error.message`, `message`
/// or `error` as a string) and falls back to the raw body.
#[derive(Clone, Default)]
pub struct JsonErrorResponseHandler {
    is_retryable: Option<RetryablePredicate>,
}

impl std::fmt::Debug for JsonErrorResponseHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonErrorResponseHandler")
            .field("custom_retryable", &self.is_retryable.is_some())
            .finish()
    }
}

impl JsonErrorResponseHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the status-based retryability with a predicate over the
    /// status code and the parsed error body
    pub fn with_retryable<P>(mut self, predicate: P) -> Self
    where
        P: Fn(u16, &serde_json::Value) -> bool + Send + Sync + 'static,
    {
        self.is_retryable = Some(Arc::new(predicate));
        self
    }

    pub fn error_message(body: &serde_json::Value) -> Option<String> {
        body.pointer("/error/message")
            .or_else(|| body.get("message"))
            .or_else(|| body.get("error"))
            .or_else(|| body.get("detail"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }
}

#[async_trait]
impl FailedResponseHandler for JsonErrorResponseHandler {
    async fn handle(&self, ctx: &ResponseContext, response: reqwest::Response) -> AiError {
        let (status, text) = match read_body(ctx, response).await {
            Ok(read) => read,
            Err(e) => return e,
        };

        let mut error = ApiCallError::new(text.clone(), &ctx.url, ctx.request_body.clone())
            .with_status(status)
            .with_response_body(text.clone());

        if let Ok(body) = parse_json(&text) {
            if let Some(message) = Self::error_message(&body) {
                error.message = message;
            }
            if let Some(predicate) = &self.is_retryable {
                error.is_retryable = predicate(status, &body);
            }
        }

        error.into()
    }
}

/// Uses the HTTP status text as the error message
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusCodeErrorResponseHandler;

#[async_trait]
impl FailedResponseHandler for StatusCodeErrorResponseHandler {
    async fn handle(&self, ctx: &ResponseContext, response: reqwest::Response) -> AiError {
        let status = response.status();
        let message = status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| status.to_string());
        let body = response.text().await.unwrap_or_default();
        ApiCallError::new(message, &ctx.url, ctx.request_body.clone())
            .with_status(status.as_u16())
            .with_response_body(body)
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_extraction() {
        let nested = serde_json::json!({"error": {"message": "quota exceeded", "type": "x"}});
        assert_eq!(
            JsonErrorResponseHandler::error_message(&nested).as_deref(),
            Some("quota exceeded")
        );

        let flat = serde_json::json!({"message": "bad voice"});
        assert_eq!(
            JsonErrorResponseHandler::error_message(&flat).as_deref(),
            Some("bad voice")
        );

        let plain = serde_json::json!({"error": "model not found"});
        assert_eq!(
            JsonErrorResponseHandler::error_message(&plain).as_deref(),
            Some("model not found")
        );

        assert_eq!(JsonErrorResponseHandler::error_message(&serde_json::json!([1])), None);
    }
}
