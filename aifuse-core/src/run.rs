//! Runs group related function calls.

use crate::abort::AbortSignal;
use crate::error::AiError;
use crate::event::{ErrorHandler, FunctionEvent, FunctionObserver};
use async_trait::async_trait;
use std::fmt;
use std::sync::Mutex;

/// A group of function calls sharing ids, an abort signal and an event log.
///
/// Every call made with a run reports its events to the run, which keeps
/// them in order of arrival.
pub struct Run {
    run_id: String,
    session_id: Option<String>,
    user_id: Option<String>,
    abort_signal: AbortSignal,
    error_handler: Option<ErrorHandler>,
    events: Mutex<Vec<FunctionEvent>>,
}

impl fmt::Debug for Run {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Run")
            .field("run_id", &self.run_id)
            .field("session_id", &self.session_id)
            .field("user_id", &self.user_id)
            .field("aborted", &self.abort_signal.is_aborted())
            .finish_non_exhaustive()
    }
}

impl Default for Run {
    fn default() -> Self {
        Self::new()
    }
}

impl Run {
    pub fn new() -> Self {
        Self {
            run_id: format!("run-{}", uuid::Uuid::new_v4()),
            session_id: None,
            user_id: None,
            abort_signal: AbortSignal::new(),
            error_handler: None,
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_abort_signal(mut self, abort_signal: AbortSignal) -> Self {
        self.abort_signal = abort_signal;
        self
    }

    /// Handler for observer failures of calls in this run
    pub fn with_error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn abort_signal(&self) -> &AbortSignal {
        &self.abort_signal
    }

    pub fn error_handler(&self) -> Option<ErrorHandler> {
        self.error_handler.clone()
    }

    /// Abort every pending and future call of this run
    pub fn abort(&self) {
        self.abort_signal.abort();
    }

    /// Snapshot of the events recorded so far
    pub fn events(&self) -> Vec<FunctionEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl FunctionObserver for Run {
    async fn on_function_event(&self, event: &FunctionEvent) -> Result<(), AiError> {
        self.events
            .lock()
            .map_err(|_| AiError::other("run event log poisoned"))?
            .push(event.clone());
        Ok(())
    }
}
