//! API configuration shared by the providers of one vendor.

use crate::abort::AbortSignal;
use crate::call::call_with_retry_and_throttle;
use crate::error::AiError;
use crate::retry::RetryStrategy;
use crate::throttle::ThrottleStrategy;
use std::collections::HashMap;

use super::post::{post_json_to_api, FailedResponseHandler, ResponseHandler};

/// Base URL, headers, retry and throttle for one provider API.
#[derive(Debug, Clone)]
pub struct ApiConfiguration {
    base_url: String,
    headers: HashMap<String, String>,
    retry: RetryStrategy,
    throttle: ThrottleStrategy,
    client: reqwest::Client,
}

impl ApiConfiguration {
    /// Configuration with default retry (exponential backoff) and no throttle
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            headers: HashMap::new(),
            retry: RetryStrategy::default(),
            throttle: ThrottleStrategy::Off,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// `Authorization: Bearer <api_key>`
    pub fn with_bearer_auth(self, api_key: impl AsRef<str>) -> Self {
        let value = format!("Bearer {}", api_key.as_ref());
        self.with_header("Authorization", value)
    }

    pub fn with_retry(mut self, retry: RetryStrategy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_throttle(mut self, throttle: ThrottleStrategy) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn retry(&self) -> &RetryStrategy {
        &self.retry
    }

    pub fn throttle(&self) -> &ThrottleStrategy {
        &self.throttle
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Join the base URL and `path` with exactly one slash
    pub fn assemble_url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{}/{}", base, path)
        }
    }

    /// POST `body` to `path` through retry and throttle
    pub async fn post_json<T, S, F>(
        &self,
        path: &str,
        body: &serde_json::Value,
        success: &S,
        failure: &F,
        abort: Option<&AbortSignal>,
    ) -> Result<T, AiError>
    where
        S: ResponseHandler<T> + ?Sized,
        F: FailedResponseHandler + ?Sized,
    {
        let url = self.assemble_url(path);
        call_with_retry_and_throttle(&self.retry, &self.throttle, abort, || {
            post_json_to_api(&self.client, &url, &self.headers, body, success, failure)
        })
        .await
    }
}

/// Resolve an API key.
///
/// An explicit key wins; otherwise `environment_variable` is read. `description`
/// names the provider in the error message.
pub fn load_api_key(
    api_key: Option<&str>,
    environment_variable: &str,
    description: &str,
) -> Result<String, AiError> {
    if let Some(key) = api_key {
        return Ok(key.to_string());
    }

    match std::env::var(environment_variable) {
        Ok(key) if !key.is_empty() => Ok(key),
        _ => Err(AiError::LoadApiKey(format!(
            "{} API key is missing. Pass it using the 'api_key' parameter or set the environment variable {}.",
            description, environment_variable
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_url() {
        let api = ApiConfiguration::new("https://api.example.com/v1/");
        assert_eq!(
            api.assemble_url("/embeddings"),
            "https://api.example.com/v1/embeddings"
        );
        assert_eq!(api.assemble_url("audio/speech"), "https://api.example.com/v1/audio/speech");
        assert_eq!(api.assemble_url(""), "https://api.example.com/v1");
    }

    #[test]
    fn test_headers_and_defaults() {
        let api = ApiConfiguration::new("http://localhost")
            .with_bearer_auth("sk-test")
            .with_header("X-Extra", "1");
        assert_eq!(api.headers()["Authorization"], "Bearer sk-test");
        assert_eq!(api.headers()["X-Extra"], "1");
        assert_eq!(api.retry(), &RetryStrategy::default());
        assert!(matches!(api.throttle(), ThrottleStrategy::Off));
    }

    #[test]
    fn test_load_api_key() {
        assert_eq!(
            load_api_key(Some("explicit"), "AIFUSE_TEST_UNUSED_KEY", "Test").unwrap(),
            "explicit"
        );

        let err = load_api_key(None, "AIFUSE_TEST_SURELY_MISSING_KEY", "Test").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Test API key is missing"));
        assert!(message.contains("AIFUSE_TEST_SURELY_MISSING_KEY"));
    }
}
