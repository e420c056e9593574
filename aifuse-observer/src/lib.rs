//! # aifuse observers
//!
//! Built-in [`FunctionObserver`](aifuse_core::FunctionObserver)
//! implementations:
//! - `UsageTracker`: token usage totals per provider and model
//! - `EventRecorder`: in-memory history of function events
//! - `ChannelObserver`: forwards events into a tokio channel

pub mod channel;
pub mod recorder;
pub mod usage;

// Re-exports
pub use channel::ChannelObserver;
pub use recorder::EventRecorder;
pub use usage::{UsageSummary, UsageTracker};
