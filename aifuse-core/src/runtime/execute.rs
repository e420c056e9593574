//! Event emission around standard and streaming function calls.

use crate::abort::AbortSignal;
use crate::config;
use crate::error::AiError;
use crate::event::{
    new_call_id, CallMetadata, FunctionEvent, FunctionEventSource, FunctionObserver,
    FunctionResult, FunctionType,
};
use crate::function::FunctionOptions;
use crate::logging::FunctionCallLogger;
use crate::queue::AsyncQueue;
use crate::types::{ModelInformation, Usage};
use futures::{Stream, StreamExt};
use std::future::Future;
use std::sync::Arc;

/// Everything the pipeline needs to know about one function call.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub function_type: FunctionType,
    pub model: ModelInformation,
    /// Serialized call input for events
    pub input: serde_json::Value,
    pub options: FunctionOptions,
}

impl CallContext {
    pub fn new(
        function_type: FunctionType,
        model: ModelInformation,
        input: serde_json::Value,
        options: FunctionOptions,
    ) -> Self {
        Self {
            function_type,
            model,
            input,
            options,
        }
    }

    /// Observers in notification order: logger, global, executor, run, call
    fn observers(&self) -> Vec<Arc<dyn FunctionObserver>> {
        let options = &self.options;
        let format = options.logging.unwrap_or_else(config::log_format);

        let mut observers = FunctionCallLogger::observers_for(format);
        observers.extend(config::global_observers());
        observers.extend(options.executor_observers.iter().cloned());
        if let Some(run) = &options.run {
            observers.push(run.clone());
        }
        observers.extend(options.observers.iter().cloned());
        observers
    }

    fn prepare(self) -> (FunctionEventSource, CallMetadata, Option<AbortSignal>) {
        let source = FunctionEventSource::new(
            self.observers(),
            self.options.run.as_ref().and_then(|run| run.error_handler()),
        );
        let abort = self.options.effective_abort_signal();
        let run = self.options.run.as_deref();

        let metadata = CallMetadata {
            function_type: self.function_type,
            call_id: new_call_id(),
            parent_call_id: self.options.parent_call_id,
            run_id: run.map(|r| r.run_id().to_string()),
            session_id: run.and_then(|r| r.session_id().map(str::to_string)),
            user_id: run.and_then(|r| r.user_id().map(str::to_string)),
            function_id: self.options.function_id,
            model: self.model,
            input: self.input,
            start_timestamp: chrono::Utc::now(),
        };

        (source, metadata, abort)
    }
}

/// What a standard call produced
#[derive(Debug, Clone)]
pub struct Generated<T> {
    pub value: T,
    /// Value reported in the `finished` event
    pub event_value: serde_json::Value,
    pub raw_response: Option<serde_json::Value>,
    pub usage: Option<Usage>,
}

impl<T> Generated<T> {
    pub fn new(value: T, event_value: serde_json::Value) -> Self {
        Self {
            value,
            event_value,
            raw_response: None,
            usage: None,
        }
    }

    pub fn with_raw_response(mut self, raw_response: Option<serde_json::Value>) -> Self {
        self.raw_response = raw_response;
        self
    }

    pub fn with_usage(mut self, usage: Option<Usage>) -> Self {
        self.usage = usage;
        self
    }
}

/// Result of [`execute_standard_call`]
#[derive(Debug, Clone)]
pub struct CallOutput<T> {
    pub value: T,
    pub raw_response: Option<serde_json::Value>,
    pub usage: Option<Usage>,
    pub metadata: CallMetadata,
}

fn failure(error: &AiError) -> FunctionResult {
    if error.is_abort() {
        FunctionResult::Abort
    } else {
        FunctionResult::Error {
            error: error.to_string(),
        }
    }
}

/// Run one non-streaming call between a `started` and a `finished` event.
///
/// The call is raced against the effective abort signal; an abort is
/// reported as `abort`, any other failure as `error`.
pub async fn execute_standard_call<T, F, Fut>(ctx: CallContext, generate: F) -> Result<CallOutput<T>, AiError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Generated<T>, AiError>>,
{
    let (source, metadata, abort) = ctx.prepare();
    source.notify(&FunctionEvent::started(metadata.clone())).await;

    let result = match &abort {
        Some(signal) => signal.race(generate()).await,
        None => generate().await,
    };

    match result {
        Ok(generated) => {
            let outcome = FunctionResult::Success {
                usage: generated.usage,
                value: generated.event_value,
                raw_response: generated.raw_response.clone(),
            };
            source
                .notify(&FunctionEvent::finished(metadata.clone(), outcome))
                .await;
            Ok(CallOutput {
                value: generated.value,
                raw_response: generated.raw_response,
                usage: generated.usage,
                metadata,
            })
        }
        Err(error) => {
            source
                .notify(&FunctionEvent::finished(metadata, failure(&error)))
                .await;
            Err(error)
        }
    }
}

/// Turns provider deltas into values for consumers and sums up the stream.
pub trait DeltaProcessor<D>: Send + 'static {
    type Output: Clone + Send + 'static;

    /// Values to publish for `delta`; may be empty while input is held back
    fn process(&mut self, delta: D) -> Vec<Self::Output>;

    /// Values still held back once the provider stream has ended
    fn flush(&mut self) -> Vec<Self::Output> {
        Vec::new()
    }

    /// Accumulated value reported in the `finished` event
    fn event_value(&self) -> serde_json::Value;

    fn usage(&self) -> Option<Usage> {
        None
    }
}

/// Handle to a streaming call in progress
#[derive(Debug, Clone)]
pub struct StreamOutput<O> {
    pub queue: AsyncQueue<O>,
    pub metadata: CallMetadata,
}

impl<O: Clone + Send + 'static> StreamOutput<O> {
    /// Published values from the start; every call replays all of them
    pub fn stream(&self) -> impl Stream<Item = Result<O, AiError>> + Send + Unpin + 'static {
        self.queue.stream()
    }
}

/// Run a streaming call.
///
/// `started` is emitted before `start` opens the provider stream. A failure
/// to open it is reported and returned. Afterwards a background task feeds
/// every delta through `processor` into an [`AsyncQueue`] and emits
/// `finished` once the stream ends, fails, or is aborted. Stream errors
/// and aborts are also pushed into the queue.
pub async fn execute_stream_call<D, St, F, Fut, P>(
    ctx: CallContext,
    start: F,
    mut processor: P,
) -> Result<StreamOutput<P::Output>, AiError>
where
    D: Send + 'static,
    St: Stream<Item = Result<D, AiError>> + Send + Unpin + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<St, AiError>>,
    P: DeltaProcessor<D>,
{
    let (source, metadata, abort) = ctx.prepare();
    source.notify(&FunctionEvent::started(metadata.clone())).await;

    let opened = match &abort {
        Some(signal) => signal.race(start()).await,
        None => start().await,
    };
    let mut deltas = match opened {
        Ok(deltas) => deltas,
        Err(error) => {
            source
                .notify(&FunctionEvent::finished(metadata, failure(&error)))
                .await;
            return Err(error);
        }
    };

    let queue = AsyncQueue::new();
    let producer = queue.clone();
    let finished_metadata = metadata.clone();

    tokio::spawn(async move {
        let outcome: Result<(), AiError> = async {
            loop {
                let next = match &abort {
                    Some(signal) => {
                        tokio::select! {
                            biased;
                            _ = signal.aborted() => return Err(AiError::Aborted),
                            next = deltas.next() => next,
                        }
                    }
                    None => deltas.next().await,
                };

                match next {
                    Some(Ok(delta)) => {
                        for value in processor.process(delta) {
                            producer.push(value)?;
                        }
                    }
                    Some(Err(error)) => return Err(error),
                    None => break,
                }
            }
            for value in processor.flush() {
                producer.push(value)?;
            }
            Ok(())
        }
        .await;

        let result = match outcome {
            Ok(()) => FunctionResult::Success {
                usage: processor.usage(),
                value: processor.event_value(),
                raw_response: None,
            },
            Err(error) => {
                tracing::debug!(error = %error, "Stream ended with error");
                let _ = producer.error(error.clone());
                failure(&error)
            }
        };
        producer.close();

        source
            .notify(&FunctionEvent::finished(finished_metadata, result))
            .await;
    });

    Ok(StreamOutput { queue, metadata })
}
