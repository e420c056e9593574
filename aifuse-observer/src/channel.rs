//! Forwarding events into a tokio channel.

use aifuse_core::error::AiError;
use aifuse_core::event::{FunctionEvent, FunctionObserver};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Observer that sends every event into an unbounded mpsc channel.
///
/// Once the receiver is dropped, delivery fails with an error that goes to
/// the event source's error handler; the observed call is unaffected.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<FunctionEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FunctionEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Observer plus the receiving end as a `Stream`
    pub fn stream() -> (Self, UnboundedReceiverStream<FunctionEvent>) {
        let (observer, receiver) = Self::new();
        (observer, UnboundedReceiverStream::new(receiver))
    }

    pub fn from_sender(sender: mpsc::UnboundedSender<FunctionEvent>) -> Self {
        Self { sender }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[async_trait]
impl FunctionObserver for ChannelObserver {
    async fn on_function_event(&self, event: &FunctionEvent) -> Result<(), AiError> {
        self.sender
            .send(event.clone())
            .map_err(|_| AiError::other("event channel closed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aifuse_core::event::EventType;
    use aifuse_core::mock::MockProvider;
    use aifuse_core::{FunctionOptions, Run, RuntimeExecutor, TextParams};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let (observer, mut receiver) = ChannelObserver::new();
        let executor = RuntimeExecutor::builder(MockProvider::new())
            .observer(Arc::new(observer))
            .finish();

        executor
            .generate_text("m", TextParams::prompt("hi"), FunctionOptions::new())
            .await
            .unwrap();

        let started = receiver.recv().await.unwrap();
        let finished = receiver.recv().await.unwrap();
        assert_eq!(started.event_type, EventType::Started);
        assert_eq!(finished.event_type, EventType::Finished);
        assert_eq!(started.call_id(), finished.call_id());
    }

    #[tokio::test]
    async fn test_stream_receiver() {
        use tokio_stream::StreamExt;

        let (observer, events) = ChannelObserver::stream();
        aifuse_core::function::embed(
            &MockProvider::new(),
            "e",
            "x",
            FunctionOptions::new().with_observer(Arc::new(observer)),
        )
        .await
        .unwrap();

        let types: Vec<EventType> = events.map(|event| event.event_type).collect().await;
        assert_eq!(types, vec![EventType::Started, EventType::Finished]);
    }

    #[tokio::test]
    async fn test_closed_channel_reports_to_error_handler() {
        let (observer, receiver) = ChannelObserver::new();
        drop(receiver);
        assert!(observer.is_closed());

        let failures = Arc::new(AtomicUsize::new(0));
        let counter = failures.clone();
        let run = Arc::new(Run::new().with_error_handler(Arc::new(move |_: &AiError| {
            counter.fetch_add(1, Ordering::SeqCst);
        })));

        let result = aifuse_core::function::generate_text(
            &MockProvider::new(),
            "m",
            TextParams::prompt("hi"),
            FunctionOptions::new()
                .with_run(run)
                .with_observer(Arc::new(observer)),
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(failures.load(Ordering::SeqCst), 2);
    }
}
