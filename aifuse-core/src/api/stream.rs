//! Parsing of streaming HTTP responses (server-sent events and NDJSON).

use crate::error::AiError;
use crate::schema::{parse_json_with, Schema};
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use std::fmt::Display;

/// Validated values from a server-sent events response.
///
/// Every `data` payload is parsed as JSON and validated with `schema`. The
/// stream ends at a `[DONE]` payload or after the first error.
pub fn parse_event_source_stream<T, S>(
    response: reqwest::Response,
    schema: S,
) -> impl Stream<Item = Result<T, AiError>> + Send + Unpin + 'static
where
    T: Send + 'static,
    S: Schema<T> + 'static,
{
    parse_event_source_bytes(response.bytes_stream(), schema)
}

/// [`parse_event_source_stream`] over any byte chunk stream
pub fn parse_event_source_bytes<St, B, E, T, S>(
    bytes: St,
    schema: S,
) -> impl Stream<Item = Result<T, AiError>> + Send + Unpin + 'static
where
    St: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
    T: Send + 'static,
    S: Schema<T> + 'static,
{
    Box::pin(async_stream::stream! {
        let mut events = bytes.eventsource();
        while let Some(event) = events.next().await {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    yield Err(AiError::stream(format!("Invalid event stream: {}", e)));
                    break;
                }
            };

            let data = event.data.trim();
            if data == "[DONE]" {
                break;
            }
            if data.is_empty() {
                continue;
            }

            match parse_json_with(data, &schema) {
                Ok(value) => yield Ok(value),
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    })
}

/// Validated values from a newline-delimited JSON response
pub fn parse_json_stream<T, S>(
    response: reqwest::Response,
    schema: S,
) -> impl Stream<Item = Result<T, AiError>> + Send + Unpin + 'static
where
    T: Send + 'static,
    S: Schema<T> + 'static,
{
    parse_json_bytes(response.bytes_stream(), schema)
}

/// [`parse_json_stream`] over any byte chunk stream.
///
/// Lines may be split across chunks; blank lines are skipped and a final
/// line without a trailing newline is still parsed.
pub fn parse_json_bytes<St, B, E, T, S>(
    bytes: St,
    schema: S,
) -> impl Stream<Item = Result<T, AiError>> + Send + Unpin + 'static
where
    St: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
    T: Send + 'static,
    S: Schema<T> + 'static,
{
    Box::pin(async_stream::stream! {
        let mut bytes = bytes;
        let mut buffer: Vec<u8> = Vec::new();
        let mut failed = false;

        'chunks: while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(chunk) => buffer.extend_from_slice(chunk.as_ref()),
                Err(e) => {
                    yield Err(AiError::stream(format!("Failed to read stream: {}", e)));
                    failed = true;
                    break;
                }
            }

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match parse_json_with(line, &schema) {
                    Ok(value) => yield Ok(value),
                    Err(e) => {
                        yield Err(e);
                        failed = true;
                        break 'chunks;
                    }
                }
            }
        }

        if !failed {
            let rest = String::from_utf8_lossy(&buffer);
            let rest = rest.trim();
            if !rest.is_empty() {
                yield parse_json_with(rest, &schema);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{schema_of, UncheckedSchema};
    use serde::Deserialize;

    #[derive(Debug, Deserialize, schemars::JsonSchema, PartialEq)]
    struct Delta {
        text: String,
    }

    fn chunks(parts: &[&str]) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> + Send + Unpin + 'static {
        let parts: Vec<Result<Vec<u8>, std::io::Error>> =
            parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        futures::stream::iter(parts)
    }

    #[tokio::test]
    async fn test_event_source_stops_at_done() {
        let body = chunks(&[
            "data: {\"text\":\"Hel\"}\n\n",
            "data: {\"te",
            "xt\":\"lo\"}\n\n",
            "data: [DONE]\n\n",
            "data: {\"text\":\"ignored\"}\n\n",
        ]);
        let values: Vec<_> = parse_event_source_bytes(body, schema_of::<Delta>())
            .map(|v| v.unwrap().text)
            .collect()
            .await;
        assert_eq!(values, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn test_event_source_validation_error_ends_stream() {
        let body = chunks(&["data: {\"wrong\":1}\n\n", "data: {\"text\":\"x\"}\n\n"]);
        let values: Vec<_> = parse_event_source_bytes(body, schema_of::<Delta>())
            .collect()
            .await;
        assert_eq!(values.len(), 1);
        assert!(matches!(values[0], Err(AiError::TypeValidation { .. })));
    }

    #[tokio::test]
    async fn test_json_lines_across_chunks() {
        let body = chunks(&["{\"a\":1}\n{\"a\"", ":2}\n\n", "{\"a\":3}"]);
        let values: Vec<_> = parse_json_bytes(body, UncheckedSchema::default())
            .map(|v| v.unwrap()["a"].as_i64().unwrap())
            .collect()
            .await;
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_json_lines_parse_error() {
        let body = chunks(&["{\"a\":1}\nnot json\n{\"a\":2}\n"]);
        let values: Vec<_> = parse_json_bytes(body, UncheckedSchema::default())
            .collect()
            .await;
        assert_eq!(values.len(), 2);
        assert!(matches!(values[1], Err(AiError::JsonParse { .. })));
    }
}
