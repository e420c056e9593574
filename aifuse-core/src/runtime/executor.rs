//! RuntimeExecutor implementation.
//!
//! The executor owns a provider wrapped in layers, a set of observers that
//! see every call it makes, and the JSON output strategy for object
//! generation. Each method delegates to the matching function in
//! [`crate::function`].

use crate::error::AiError;
use crate::event::FunctionObserver;
use crate::function::{
    self, EmbedManyResult, FunctionOptions, ImageResult, SpeechStreamResult, TextStreamResult,
};
use crate::layer::Layer;
use crate::provider::Provider;
use crate::runtime::CallOutput;
use crate::schema::Schema;
use crate::strategy::{detect_json_strategy, JsonOutputStrategy};
use crate::types::*;
use std::fmt;
use std::sync::Arc;

/// Type-erased provider that can be shared across threads
type BoxedProvider = Arc<dyn Provider>;

/// Builder for composing a provider with layers and observers.
///
/// Layers wrap the provider in the order they are added, so the last
/// layer is the outermost one.
///
/// # Example
///
/// ```ignore
/// let executor = RuntimeExecutor::builder(provider)
///     .layer(RetryLayer::new())
///     .layer(LoggingLayer::new())
///     .observer(Arc::new(UsageTracker::new()))
///     .finish();
/// ```
pub struct RuntimeExecutorBuilder<P> {
    provider: P,
    observers: Vec<Arc<dyn FunctionObserver>>,
    json_strategy: Option<Box<dyn JsonOutputStrategy>>,
}

impl<P: Provider> RuntimeExecutorBuilder<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            observers: Vec::new(),
            json_strategy: None,
        }
    }

    /// Wrap the provider in `layer`
    pub fn layer<L>(self, layer: L) -> RuntimeExecutorBuilder<L::LayeredProvider>
    where
        L: Layer<P>,
    {
        RuntimeExecutorBuilder {
            provider: layer.layer(self.provider),
            observers: self.observers,
            json_strategy: self.json_strategy,
        }
    }

    /// Observer notified of every call made through the executor
    pub fn observer(mut self, observer: Arc<dyn FunctionObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// JSON output strategy for object generation; detected from the
    /// provider id when not set
    pub fn json_strategy(mut self, strategy: Box<dyn JsonOutputStrategy>) -> Self {
        self.json_strategy = Some(strategy);
        self
    }

    pub fn finish(self) -> RuntimeExecutor {
        let provider: BoxedProvider = Arc::new(self.provider);
        let json_strategy = self
            .json_strategy
            .unwrap_or_else(|| detect_json_strategy(&provider.info().id));

        RuntimeExecutor {
            provider,
            observers: self.observers,
            json_strategy,
        }
    }
}

/// Entry point for making calls against one composed provider.
pub struct RuntimeExecutor {
    provider: BoxedProvider,
    observers: Vec<Arc<dyn FunctionObserver>>,
    json_strategy: Box<dyn JsonOutputStrategy>,
}

impl fmt::Debug for RuntimeExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeExecutor")
            .field("provider", &self.provider)
            .field("observers", &self.observers)
            .field("json_strategy", &self.json_strategy.name())
            .finish()
    }
}

impl RuntimeExecutor {
    pub fn builder<P: Provider>(provider: P) -> RuntimeExecutorBuilder<P> {
        RuntimeExecutorBuilder::new(provider)
    }

    pub fn info(&self) -> Arc<ProviderInfo> {
        self.provider.info()
    }

    /// The composed provider
    pub fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }

    pub fn observers(&self) -> &[Arc<dyn FunctionObserver>] {
        &self.observers
    }

    fn options(&self, options: FunctionOptions) -> FunctionOptions {
        options.with_executor_observers(&self.observers)
    }

    pub async fn generate_text(
        &self,
        model: &str,
        params: TextParams,
        options: FunctionOptions,
    ) -> Result<TextResult, AiError> {
        function::generate_text(self.provider(), model, params, self.options(options)).await
    }

    pub async fn generate_text_full(
        &self,
        model: &str,
        params: TextParams,
        options: FunctionOptions,
    ) -> Result<CallOutput<TextResult>, AiError> {
        function::generate_text_full(self.provider(), model, params, self.options(options)).await
    }

    pub async fn stream_text(
        &self,
        model: &str,
        params: TextParams,
        options: FunctionOptions,
    ) -> Result<TextStreamResult, AiError> {
        function::stream_text(self.provider(), model, params, self.options(options)).await
    }

    /// Generate an object with the executor's JSON output strategy
    pub async fn generate_object<T, S>(
        &self,
        model: &str,
        params: ObjectParams,
        schema: &S,
        options: FunctionOptions,
    ) -> Result<ObjectResult<T>, AiError>
    where
        T: Send,
        S: Schema<T> + ?Sized,
    {
        function::generate_object_with(
            self.provider(),
            model,
            params,
            schema,
            self.json_strategy.as_ref(),
            self.options(options),
        )
        .await
    }

    pub async fn embed(
        &self,
        model: &str,
        value: impl Into<String>,
        options: FunctionOptions,
    ) -> Result<Vec<f32>, AiError> {
        function::embed(self.provider(), model, value, self.options(options)).await
    }

    pub async fn embed_many(
        &self,
        model: &str,
        values: Vec<String>,
        options: FunctionOptions,
    ) -> Result<EmbedManyResult, AiError> {
        function::embed_many(self.provider(), model, values, self.options(options)).await
    }

    pub async fn generate_speech(
        &self,
        request: SpeechRequest,
        options: FunctionOptions,
    ) -> Result<SpeechResponse, AiError> {
        function::generate_speech(self.provider(), request, self.options(options)).await
    }

    pub async fn stream_speech(
        &self,
        request: SpeechStreamRequest,
        options: FunctionOptions,
    ) -> Result<SpeechStreamResult, AiError> {
        function::stream_speech(self.provider(), request, self.options(options)).await
    }

    pub async fn generate_transcription(
        &self,
        request: TranscriptionRequest,
        options: FunctionOptions,
    ) -> Result<TranscriptionResponse, AiError> {
        function::generate_transcription(self.provider(), request, self.options(options)).await
    }

    pub async fn generate_image(
        &self,
        request: ImageRequest,
        options: FunctionOptions,
    ) -> Result<ImageResult, AiError> {
        function::generate_image(self.provider(), request, self.options(options)).await
    }
}
