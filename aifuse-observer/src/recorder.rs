//! In-memory event recording.

use aifuse_core::error::AiError;
use aifuse_core::event::{EventType, FunctionEvent, FunctionObserver, FunctionType};
use async_trait::async_trait;
use std::sync::Mutex;

/// Observer that keeps every event it receives, in arrival order.
///
/// With a capacity set, the oldest events are dropped first.
#[derive(Debug, Default)]
pub struct EventRecorder {
    events: Mutex<Vec<FunctionEvent>>,
    capacity: Option<usize>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Mutex::new(Vec::with_capacity(capacity)),
            capacity: Some(capacity),
        }
    }

    pub fn events(&self) -> Vec<FunctionEvent> {
        self.lock().clone()
    }

    /// Events of one call, `started` first
    pub fn events_for_call(&self, call_id: &str) -> Vec<FunctionEvent> {
        self.filtered(|event| event.call_id() == call_id)
    }

    pub fn finished(&self) -> Vec<FunctionEvent> {
        self.filtered(|event| event.event_type == EventType::Finished)
    }

    pub fn of_type(&self, function_type: FunctionType) -> Vec<FunctionEvent> {
        self.filtered(|event| event.function_type() == function_type)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn filtered(&self, keep: impl Fn(&FunctionEvent) -> bool) -> Vec<FunctionEvent> {
        self.lock().iter().filter(|event| keep(event)).cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<FunctionEvent>> {
        // A poisoned lock still holds valid events
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl FunctionObserver for EventRecorder {
    async fn on_function_event(&self, event: &FunctionEvent) -> Result<(), AiError> {
        let mut events = self.lock();
        if let Some(capacity) = self.capacity {
            if capacity == 0 {
                return Ok(());
            }
            if events.len() >= capacity {
                events.remove(0);
            }
        }
        events.push(event.clone());
        Ok(())
    }
}
