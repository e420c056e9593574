use crate::abort::AbortSignal;
use crate::config::LogFormat;
use crate::event::FunctionObserver;
use crate::run::Run;
use std::sync::Arc;

/// Per-call options shared by every convenience function.
#[derive(Debug, Clone, Default)]
pub struct FunctionOptions {
    /// Caller-chosen id reported in events
    pub function_id: Option<String>,
    /// Overrides the global log format for this call
    pub logging: Option<LogFormat>,
    pub observers: Vec<Arc<dyn FunctionObserver>>,
    pub run: Option<Arc<Run>>,
    pub parent_call_id: Option<String>,
    /// Takes precedence over the run's abort signal
    pub abort_signal: Option<AbortSignal>,
    pub(crate) executor_observers: Vec<Arc<dyn FunctionObserver>>,
}

impl FunctionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_function_id(mut self, function_id: impl Into<String>) -> Self {
        self.function_id = Some(function_id.into());
        self
    }

    pub fn with_logging(mut self, logging: LogFormat) -> Self {
        self.logging = Some(logging);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn FunctionObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn with_run(mut self, run: Arc<Run>) -> Self {
        self.run = Some(run);
        self
    }

    pub fn with_parent_call_id(mut self, parent_call_id: impl Into<String>) -> Self {
        self.parent_call_id = Some(parent_call_id.into());
        self
    }

    pub fn with_abort_signal(mut self, abort_signal: AbortSignal) -> Self {
        self.abort_signal = Some(abort_signal);
        self
    }

    pub(crate) fn with_executor_observers(mut self, observers: &[Arc<dyn FunctionObserver>]) -> Self {
        self.executor_observers.extend(observers.iter().cloned());
        self
    }

    /// The abort signal in effect: the explicit one, else the run's
    pub fn effective_abort_signal(&self) -> Option<AbortSignal> {
        self.abort_signal
            .clone()
            .or_else(|| self.run.as_ref().map(|run| run.abort_signal().clone()))
    }
}
