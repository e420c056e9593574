//! Embeddings.

use crate::error::AiError;
use crate::event::FunctionType;
use crate::function::{model_information, FunctionOptions};
use crate::provider::Provider;
use crate::runtime::{execute_standard_call, CallContext, Generated};
use crate::types::{EmbeddingRequest, EmbeddingResponse, Usage};

/// Embeddings for a list of values, in value order
#[derive(Debug, Clone)]
pub struct EmbedManyResult {
    pub embeddings: Vec<Vec<f32>>,
    /// Summed over all provider calls; `None` if no call reported usage
    pub usage: Option<Usage>,
    pub raw_responses: Vec<serde_json::Value>,
}

fn merge(responses: Vec<EmbeddingResponse>) -> EmbedManyResult {
    let mut result = EmbedManyResult {
        embeddings: Vec::new(),
        usage: None,
        raw_responses: Vec::new(),
    };
    for response in responses {
        result.embeddings.extend(response.embeddings);
        if let Some(usage) = response.usage {
            result.usage.get_or_insert_with(Usage::default).add(&usage);
        }
        result.raw_responses.extend(response.raw);
    }
    result
}

/// Embed `values`.
///
/// Values are split into groups of the provider's
/// `max_values_per_embedding_call`. Groups run concurrently when the
/// provider supports parallel calls, one after another otherwise. The
/// number of embeddings must match the number of values.
pub async fn embed_many<P: Provider + ?Sized>(
    provider: &P,
    model: &str,
    values: Vec<String>,
    options: FunctionOptions,
) -> Result<EmbedManyResult, AiError> {
    let ctx = CallContext::new(
        FunctionType::Embed,
        model_information(provider, model),
        serde_json::json!({ "values": values }),
        options,
    );

    let output = execute_standard_call(ctx, || async move {
        let expected = values.len();
        let groups: Vec<Vec<String>> = match provider.max_values_per_embedding_call() {
            Some(max) if max > 0 => values.chunks(max).map(|group| group.to_vec()).collect(),
            _ if values.is_empty() => Vec::new(),
            _ => vec![values],
        };

        let requests = groups
            .into_iter()
            .map(|group| EmbeddingRequest::new(model, group));

        let responses = if provider.supports_parallel_embedding_calls() {
            futures::future::try_join_all(requests.map(|req| provider.embed(req))).await?
        } else {
            let mut responses = Vec::new();
            for req in requests {
                responses.push(provider.embed(req).await?);
            }
            responses
        };

        let result = merge(responses);
        if result.embeddings.len() != expected {
            return Err(AiError::provider(format!(
                "The number of embeddings ({}) does not match the number of values ({})",
                result.embeddings.len(),
                expected
            )));
        }

        let usage = result.usage;
        let event_value = serde_json::json!({ "embeddings": result.embeddings.len() });
        Ok(Generated::new(result, event_value).with_usage(usage))
    })
    .await?;

    Ok(output.value)
}

/// Embed a single value
pub async fn embed<P: Provider + ?Sized>(
    provider: &P,
    model: &str,
    value: impl Into<String>,
    options: FunctionOptions,
) -> Result<Vec<f32>, AiError> {
    let result = embed_many(provider, model, vec![value.into()], options).await?;
    result
        .embeddings
        .into_iter()
        .next()
        .ok_or_else(|| AiError::provider("No embedding returned"))
}

/// Cosine similarity of two vectors of equal length.
///
/// Returns `0.0` when either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, AiError> {
    if a.len() != b.len() {
        return Err(AiError::invalid_request(format!(
            "Vectors must have the same length ({} != {})",
            a.len(),
            b.len()
        )));
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let magnitude = |v: &[f32]| v.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denominator = magnitude(a) * magnitude(b);

    if denominator == 0.0 {
        Ok(0.0)
    } else {
        Ok(dot / denominator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockProvider;
    use crate::types::ProviderInfo;
    use std::sync::Arc;

    /// Answers every request with a single embedding
    #[derive(Debug)]
    struct ShortProvider(Arc<ProviderInfo>);

    #[async_trait::async_trait]
    impl Provider for ShortProvider {
        fn info(&self) -> Arc<ProviderInfo> {
            self.0.clone()
        }

        async fn embed(&self, _req: EmbeddingRequest) -> Result<EmbeddingResponse, AiError> {
            Ok(EmbeddingResponse {
                embeddings: vec![vec![1.0]],
                usage: None,
                raw: None,
            })
        }
    }

    #[tokio::test]
    async fn test_embedding_count_mismatch() {
        let provider = ShortProvider(Arc::new(ProviderInfo::new("short", "Short")));
        let err = embed_many(
            &provider,
            "e",
            vec!["a".into(), "b".into()],
            FunctionOptions::new(),
        )
        .await
        .unwrap_err();

        match err {
            AiError::Provider(msg) => assert_eq!(
                msg,
                "The number of embeddings (1) does not match the number of values (2)"
            ),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_embed_many_without_values() {
        for mock in [
            MockProvider::new(),
            MockProvider::new().with_max_values_per_embedding_call(2),
        ] {
            let result = embed_many(&mock, "e", vec![], FunctionOptions::new())
                .await
                .unwrap();
            assert!(result.embeddings.is_empty());
            assert!(result.usage.is_none());
            assert_eq!(mock.calls(), 0);
        }
    }

    #[test]
    fn test_cosine_similarity() {
        let same = cosine_similarity(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]).unwrap();
        assert!((same - 1.0).abs() < 1e-6);

        let orthogonal = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap();
        assert!(orthogonal.abs() < 1e-6);

        let opposite = cosine_similarity(&[1.0, 1.0], &[-1.0, -1.0]).unwrap();
        assert!((opposite + 1.0).abs() < 1e-6);

        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).unwrap(), 0.0);
        assert!(matches!(
            cosine_similarity(&[1.0], &[1.0, 2.0]),
            Err(AiError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_merge_sums_usage() {
        let responses = vec![
            EmbeddingResponse {
                embeddings: vec![vec![1.0]],
                usage: Some(Usage::new(2, 0)),
                raw: None,
            },
            EmbeddingResponse {
                embeddings: vec![vec![2.0], vec![3.0]],
                usage: Some(Usage::new(3, 0)),
                raw: Some(serde_json::json!({"id": 2})),
            },
        ];
        let merged = merge(responses);
        assert_eq!(merged.embeddings, vec![vec![1.0], vec![2.0], vec![3.0]]);
        assert_eq!(merged.usage.unwrap().prompt_tokens, 5);
        assert_eq!(merged.raw_responses.len(), 1);
    }
}
