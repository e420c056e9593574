//! Response cache for chat completions and embeddings.

use aifuse_core::error::AiError;
use aifuse_core::impl_layered_provider;
use aifuse_core::layer::{Layer, LayeredProvider};
use aifuse_core::provider::Provider;
use aifuse_core::types::*;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Cached {
    Chat(ChatCompletionResponse),
    Embedding(EmbeddingResponse),
}

#[derive(Debug, Default)]
struct CacheState {
    entries: DashMap<String, Cached>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Memoizes `chat_completion` and `embed` responses keyed by the
/// serialized request.
///
/// Only successful responses are stored. With a capacity set, new entries
/// are dropped once the cache is full. Every provider built from one layer
/// shares the same cache.
#[derive(Debug, Clone, Default)]
pub struct CacheLayer {
    state: Arc<CacheState>,
    capacity: Option<usize>,
}

impl CacheLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn len(&self) -> usize {
        self.state.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.state.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.state.misses.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.state.entries.clear();
    }
}

impl<P: Provider> Layer<P> for CacheLayer {
    type LayeredProvider = CacheProvider<P>;

    fn layer(&self, inner: P) -> Self::LayeredProvider {
        CacheProvider {
            inner,
            state: self.state.clone(),
            capacity: self.capacity,
        }
    }
}

/// Provider wrapped with a response cache
#[derive(Debug)]
pub struct CacheProvider<P> {
    inner: P,
    state: Arc<CacheState>,
    capacity: Option<usize>,
}

impl<P: Provider> CacheProvider<P> {
    fn key(&self, operation: &str, request: serde_json::Result<String>) -> Option<String> {
        // Unserializable requests bypass the cache
        request
            .ok()
            .map(|body| format!("{}:{}:{}", self.inner.info().id, operation, body))
    }

    fn lookup(&self, key: &str) -> Option<Cached> {
        let found = self.state.entries.get(key).map(|entry| entry.value().clone());
        let counter = if found.is_some() {
            &self.state.hits
        } else {
            &self.state.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    fn store(&self, key: String, value: Cached) {
        if let Some(capacity) = self.capacity {
            if self.state.entries.len() >= capacity && !self.state.entries.contains_key(&key) {
                tracing::debug!(capacity, "Response cache full, not storing");
                return;
            }
        }
        self.state.entries.insert(key, value);
    }
}

#[async_trait]
impl<P: Provider> LayeredProvider for CacheProvider<P> {
    type Inner = P;

    fn inner(&self) -> &Self::Inner {
        &self.inner
    }

    async fn layered_chat_completion(
        &self,
        req: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, AiError> {
        let key = self.key("chat", serde_json::to_string(&req));
        if let Some(key) = &key {
            if let Some(Cached::Chat(response)) = self.lookup(key) {
                tracing::debug!(model = %req.model, "chat_completion served from cache");
                return Ok(response);
            }
        }

        let response = self.inner.chat_completion(req).await?;
        if let Some(key) = key {
            self.store(key, Cached::Chat(response.clone()));
        }
        Ok(response)
    }

    async fn layered_embed(&self, req: EmbeddingRequest) -> Result<EmbeddingResponse, AiError> {
        let key = self.key("embed", serde_json::to_string(&req));
        if let Some(key) = &key {
            if let Some(Cached::Embedding(response)) = self.lookup(key) {
                tracing::debug!(model = %req.model, "embed served from cache");
                return Ok(response);
            }
        }

        let response = self.inner.embed(req).await?;
        if let Some(key) = key {
            self.store(key, Cached::Embedding(response.clone()));
        }
        Ok(response)
    }
}

impl_layered_provider!(<P: Provider> CacheProvider<P>);

#[cfg(test)]
mod tests {
    use super::*;
    use aifuse_core::mock::MockProvider;

    #[tokio::test]
    async fn test_repeated_request_hits_cache() {
        let mock = Arc::new(MockProvider::new());
        let cache = CacheLayer::new();
        let provider = cache.layer(mock.clone());
        let req = ChatCompletionRequest::new("m", vec![Message::user("same")]);

        let first = provider.chat_completion(req.clone()).await.unwrap();
        let second = provider.chat_completion(req).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(mock.calls(), 1);
        assert_eq!((cache.hits(), cache.misses()), (1, 1));

        provider
            .chat_completion(ChatCompletionRequest::new("m", vec![Message::user("other")]))
            .await
            .unwrap();
        assert_eq!(mock.calls(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let mock = Arc::new(MockProvider::new().with_transient_failures(1));
        let provider = CacheLayer::new().layer(mock.clone());
        let req = EmbeddingRequest::new("e", vec!["v".into()]);

        assert!(provider.embed(req.clone()).await.is_err());
        assert!(provider.embed(req.clone()).await.is_ok());
        assert!(provider.embed(req).await.is_ok());
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn test_capacity_limits_entries() {
        let mock = Arc::new(MockProvider::new());
        let cache = CacheLayer::new().with_capacity(1);
        let provider = cache.layer(mock.clone());

        for value in ["a", "b", "b"] {
            provider
                .embed(EmbeddingRequest::new("e", vec![value.into()]))
                .await
                .unwrap();
        }

        assert_eq!(cache.len(), 1);
        assert_eq!(mock.calls(), 3);
    }
}
