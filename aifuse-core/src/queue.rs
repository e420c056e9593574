//! Replaying async queue for streaming deltas.

use crate::error::AiError;
use futures::Stream;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

#[derive(Debug, Clone)]
enum Entry<T> {
    Value(T),
    Error(AiError),
}

#[derive(Debug)]
struct State<T> {
    entries: Vec<Entry<T>>,
    closed: bool,
}

#[derive(Debug)]
struct Shared<T> {
    state: Mutex<State<T>>,
    notify: Notify,
}

/// Multi-consumer queue where every consumer sees every entry.
///
/// Producers `push` values or an `error`, then `close`. Each call to
/// [`stream`](AsyncQueue::stream) starts from the first entry ever pushed,
/// so late consumers replay the full sequence. A stream ends after yielding
/// an error, or once it has drained a closed queue.
#[derive(Debug)]
pub struct AsyncQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for AsyncQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Default for AsyncQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> AsyncQueue<T> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    entries: Vec::new(),
                    closed: false,
                }),
                notify: Notify::new(),
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State<T>>, AiError> {
        self.shared
            .state
            .lock()
            .map_err(|_| AiError::stream("queue state poisoned"))
    }

    fn append(&self, entry: Entry<T>, what: &str) -> Result<(), AiError> {
        let mut state = self.lock()?;
        if state.closed {
            return Err(AiError::stream(format!("Cannot push {} to closed queue", what)));
        }
        state.entries.push(entry);
        drop(state);
        self.shared.notify.notify_waiters();
        Ok(())
    }

    /// Append a value
    pub fn push(&self, value: T) -> Result<(), AiError> {
        self.append(Entry::Value(value), "value")
    }

    /// Append an error; consumers stop after yielding it
    pub fn error(&self, error: AiError) -> Result<(), AiError> {
        self.append(Entry::Error(error), "error")
    }

    /// Mark the end of the sequence. Closing twice is a no-op.
    pub fn close(&self) {
        if let Ok(mut state) = self.lock() {
            state.closed = true;
        }
        self.shared.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().map(|state| state.closed).unwrap_or(true)
    }

    /// Number of entries pushed so far
    pub fn len(&self) -> usize {
        self.lock().map(|state| state.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stream over all entries, starting from the first
    pub fn stream(&self) -> impl Stream<Item = Result<T, AiError>> + Send + Unpin + 'static {
        let shared = self.shared.clone();
        Box::pin(async_stream::stream! {
            let mut position = 0usize;
            loop {
                let notified = shared.notify.notified();
                let next = match shared.state.lock() {
                    Ok(state) => {
                        if position < state.entries.len() {
                            Some(Some(state.entries[position].clone()))
                        } else if state.closed {
                            Some(None)
                        } else {
                            None
                        }
                    }
                    Err(_) => Some(Some(Entry::Error(AiError::stream("queue state poisoned")))),
                };

                match next {
                    Some(Some(Entry::Value(value))) => {
                        position += 1;
                        yield Ok(value);
                    }
                    Some(Some(Entry::Error(error))) => {
                        yield Err(error);
                        break;
                    }
                    Some(None) => break,
                    None => notified.await,
                }
            }
        })
    }
}
