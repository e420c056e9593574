//! Layer trait and abstractions.
//!
//! Layers provide a composable way to wrap providers with cross-cutting
//! concerns like logging, retry, throttling and caching.

use crate::error::AiError;
use crate::provider::{AudioStream, Capability, ChatCompletionStream, Provider};
use crate::types::*;
use async_trait::async_trait;
use std::sync::Arc;

/// Layer trait for wrapping providers.
///
/// Each layer wraps an inner provider and returns a new provider with
/// enhanced capabilities.
pub trait Layer<P: Provider> {
    /// The type of the layered provider
    type LayeredProvider: Provider;

    /// Wrap the inner provider with this layer
    fn layer(&self, inner: P) -> Self::LayeredProvider;
}

/// Helper trait for layered providers.
///
/// This trait provides default forwarding implementations for every provider
/// method. Implementers only need to override the methods they want to
/// intercept, then call [`impl_layered_provider!`](crate::impl_layered_provider)
/// to derive the `Provider` impl.
#[async_trait]
pub trait LayeredProvider: Sized + Provider {
    /// The inner provider type
    type Inner: Provider;

    /// Get a reference to the inner provider
    fn inner(&self) -> &Self::Inner;

    fn layered_info(&self) -> Arc<ProviderInfo> {
        self.inner().info()
    }

    fn layered_capabilities(&self) -> Vec<Capability> {
        self.inner().capabilities()
    }

    async fn layered_chat_completion(
        &self,
        req: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, AiError> {
        self.inner().chat_completion(req).await
    }

    async fn layered_stream_chat_completion(
        &self,
        req: ChatCompletionRequest,
    ) -> Result<Box<ChatCompletionStream>, AiError> {
        self.inner().stream_chat_completion(req).await
    }

    async fn layered_embed(&self, req: EmbeddingRequest) -> Result<EmbeddingResponse, AiError> {
        self.inner().embed(req).await
    }

    fn layered_max_values_per_embedding_call(&self) -> Option<usize> {
        self.inner().max_values_per_embedding_call()
    }

    fn layered_supports_parallel_embedding_calls(&self) -> bool {
        self.inner().supports_parallel_embedding_calls()
    }

    async fn layered_generate_speech(&self, req: SpeechRequest) -> Result<SpeechResponse, AiError> {
        self.inner().generate_speech(req).await
    }

    async fn layered_stream_speech(
        &self,
        req: SpeechStreamRequest,
    ) -> Result<Box<AudioStream>, AiError> {
        self.inner().stream_speech(req).await
    }

    async fn layered_transcribe(
        &self,
        req: TranscriptionRequest,
    ) -> Result<TranscriptionResponse, AiError> {
        self.inner().transcribe(req).await
    }

    async fn layered_generate_image(&self, req: ImageRequest) -> Result<ImageResponse, AiError> {
        self.inner().generate_image(req).await
    }
}

/// Macro to implement Provider trait by forwarding to LayeredProvider methods.
///
/// Accepts an optional generic parameter list:
/// `impl_layered_provider!(<P: Provider> MyProvider<P>)`.
#[macro_export]
macro_rules! impl_layered_provider {
    (@impl [$($generics:tt)*] $type:ty) => {
        #[async_trait::async_trait]
        impl<$($generics)*> $crate::provider::Provider for $type {
            fn info(&self) -> std::sync::Arc<$crate::types::ProviderInfo> {
                $crate::layer::LayeredProvider::layered_info(self)
            }

            fn capabilities(&self) -> Vec<$crate::provider::Capability> {
                $crate::layer::LayeredProvider::layered_capabilities(self)
            }

            async fn chat_completion(
                &self,
                req: $crate::types::ChatCompletionRequest,
            ) -> ::std::result::Result<$crate::types::ChatCompletionResponse, $crate::error::AiError> {
                $crate::layer::LayeredProvider::layered_chat_completion(self, req).await
            }

            async fn stream_chat_completion(
                &self,
                req: $crate::types::ChatCompletionRequest,
            ) -> ::std::result::Result<Box<$crate::provider::ChatCompletionStream>, $crate::error::AiError> {
                $crate::layer::LayeredProvider::layered_stream_chat_completion(self, req).await
            }

            async fn embed(
                &self,
                req: $crate::types::EmbeddingRequest,
            ) -> ::std::result::Result<$crate::types::EmbeddingResponse, $crate::error::AiError> {
                $crate::layer::LayeredProvider::layered_embed(self, req).await
            }

            fn max_values_per_embedding_call(&self) -> Option<usize> {
                $crate::layer::LayeredProvider::layered_max_values_per_embedding_call(self)
            }

            fn supports_parallel_embedding_calls(&self) -> bool {
                $crate::layer::LayeredProvider::layered_supports_parallel_embedding_calls(self)
            }

            async fn generate_speech(
                &self,
                req: $crate::types::SpeechRequest,
            ) -> ::std::result::Result<$crate::types::SpeechResponse, $crate::error::AiError> {
                $crate::layer::LayeredProvider::layered_generate_speech(self, req).await
            }

            async fn stream_speech(
                &self,
                req: $crate::types::SpeechStreamRequest,
            ) -> ::std::result::Result<Box<$crate::provider::AudioStream>, $crate::error::AiError> {
                $crate::layer::LayeredProvider::layered_stream_speech(self, req).await
            }

            async fn transcribe(
                &self,
                req: $crate::types::TranscriptionRequest,
            ) -> ::std::result::Result<$crate::types::TranscriptionResponse, $crate::error::AiError> {
                $crate::layer::LayeredProvider::layered_transcribe(self, req).await
            }

            async fn generate_image(
                &self,
                req: $crate::types::ImageRequest,
            ) -> ::std::result::Result<$crate::types::ImageResponse, $crate::error::AiError> {
                $crate::layer::LayeredProvider::layered_generate_image(self, req).await
            }
        }
    };
    (<$($gen:ident : $bound:path),*> $type:ty) => {
        $crate::impl_layered_provider!(@impl [$($gen: $bound),*] $type);
    };
    ($type:ty) => {
        $crate::impl_layered_provider!(@impl [] $type);
    };
}
