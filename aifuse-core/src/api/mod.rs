//! HTTP plumbing for provider implementations.
//!
//! Providers describe an endpoint with [`ApiConfiguration`], then post
//! through it with a success and a failure handler. Retry and throttle
//! from the configuration wrap every request.

mod config;
mod post;
mod stream;

pub use config::{load_api_key, ApiConfiguration};
pub use post::{
    post_json_to_api, post_to_api, ApiBody, BytesResponseHandler, FailedResponseHandler,
    JsonErrorResponseHandler, JsonResponseHandler, RawResponseHandler, ResponseContext,
    ResponseHandler, StatusCodeErrorResponseHandler, TextResponseHandler,
};
pub use stream::{
    parse_event_source_bytes, parse_event_source_stream, parse_json_bytes, parse_json_stream,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AiError, RetryErrorReason};
    use crate::retry::RetryStrategy;
    use crate::schema::{schema_of, UncheckedSchema};
    use futures::StreamExt;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve `responses` in order, one per connection; returns base URL and hit counter
    async fn serve(responses: Vec<String>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            for response in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                counter.fetch_add(1, Ordering::SeqCst);
                read_request(&mut socket).await;
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
        });

        (format!("http://{}", addr), hits)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut data = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return;
            }
            data.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&data).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let lower = l.to_ascii_lowercase();
                        lower
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                    })
                    .unwrap_or(0);
                if data.len() >= end + 4 + length {
                    return;
                }
            }
        }
    }

    fn response(status: &str, extra_headers: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\ncontent-length: {}\r\nconnection: close\r\n{}\r\n{}",
            status,
            body.len(),
            extra_headers,
            body
        )
    }

    #[derive(Debug, Deserialize, schemars::JsonSchema)]
    struct Echo {
        ok: bool,
    }

    #[tokio::test]
    async fn test_post_json_success() {
        let (base, hits) = serve(vec![response("200 OK", "", r#"{"ok":true}"#)]).await;
        let api = ApiConfiguration::new(base).with_retry(RetryStrategy::Never);

        let echo: Echo = api
            .post_json(
                "/echo",
                &serde_json::json!({"input": "x"}),
                &JsonResponseHandler::new(schema_of::<Echo>()),
                &JsonErrorResponseHandler::new(),
                None,
            )
            .await
            .unwrap();

        assert!(echo.ok);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_server_errors_then_succeeds() {
        let (base, hits) = serve(vec![
            response("503 Service Unavailable", "", r#"{"error":{"message":"overloaded"}}"#),
            response("200 OK", "", "fine"),
        ])
        .await;
        let api = ApiConfiguration::new(base).with_retry(RetryStrategy::ExponentialBackoff {
            max_tries: 3,
            initial_delay: Duration::from_millis(1),
            backoff_factor: 1.0,
        });

        let text = api
            .post_json(
                "x",
                &serde_json::json!({}),
                &TextResponseHandler,
                &JsonErrorResponseHandler::new(),
                None,
            )
            .await
            .unwrap();

        assert_eq!(text, "fine");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let (base, hits) = serve(vec![response(
            "400 Bad Request",
            "",
            r#"{"error":{"message":"unknown voice"}}"#,
        )])
        .await;
        let api = ApiConfiguration::new(base).with_retry(RetryStrategy::ExponentialBackoff {
            max_tries: 3,
            initial_delay: Duration::from_millis(1),
            backoff_factor: 2.0,
        });

        let err = api
            .post_json(
                "x",
                &serde_json::json!({"voice": "nope"}),
                &BytesResponseHandler,
                &JsonErrorResponseHandler::new(),
                None,
            )
            .await
            .unwrap_err();

        match err {
            AiError::ApiCall(e) => {
                assert_eq!(e.message, "unknown voice");
                assert_eq!(e.status_code, Some(400));
                assert!(!e.is_retryable);
                assert_eq!(e.request_body["voice"], "nope");
            }
            other => panic!("expected api call error, got {other:?}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_carry_retry_after() {
        let (base, _) = serve(vec![
            response("429 Too Many Requests", "retry-after: 0\r\n", "slow down"),
            response("429 Too Many Requests", "retry-after: 0\r\n", "slow down"),
        ])
        .await;
        let api = ApiConfiguration::new(base).with_retry(RetryStrategy::ExponentialBackoff {
            max_tries: 2,
            initial_delay: Duration::from_millis(1),
            backoff_factor: 1.0,
        });

        let err = api
            .post_json(
                "x",
                &serde_json::json!({}),
                &TextResponseHandler,
                &StatusCodeErrorResponseHandler,
                None,
            )
            .await
            .unwrap_err();

        match err {
            AiError::Retry(retry) => {
                assert_eq!(retry.reason, RetryErrorReason::MaxTriesExceeded);
                assert_eq!(retry.errors.len(), 2);
                match retry.last_error() {
                    Some(AiError::ApiCall(e)) => {
                        assert_eq!(e.message, "Too Many Requests");
                        assert_eq!(e.retry_after, Some(Duration::from_secs(0)));
                    }
                    other => panic!("unexpected last error {other:?}"),
                }
            }
            other => panic!("expected retry error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_streaming_response() {
        let body = "data: {\"n\":1}\n\ndata: {\"n\":2}\n\ndata: [DONE]\n\n";
        let (base, _) = serve(vec![response(
            "200 OK",
            "content-type: text/event-stream\r\n",
            body,
        )])
        .await;
        let api = ApiConfiguration::new(base).with_retry(RetryStrategy::Never);

        let raw = api
            .post_json(
                "stream",
                &serde_json::json!({"stream": true}),
                &RawResponseHandler,
                &JsonErrorResponseHandler::new(),
                None,
            )
            .await
            .unwrap();

        let values: Vec<i64> = parse_event_source_stream(raw, UncheckedSchema::default())
            .map(|v| v.unwrap()["n"].as_i64().unwrap())
            .collect()
            .await;
        assert_eq!(values, vec![1, 2]);
    }
}
