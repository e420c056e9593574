//! # aifuse layers
//!
//! Built-in layers for aifuse providers:
//! - `LoggingLayer`: traces every provider call with timing information
//! - `RetryLayer`: retries failed calls with a `RetryStrategy`
//! - `ThrottleLayer`: limits concurrent calls with a `ThrottleStrategy`
//! - `CacheLayer`: memoizes chat completion and embedding responses
//!
//! ## Usage
//!
//! ```ignore
//! use aifuse_core::RuntimeExecutor;
//! use aifuse_layer::{LoggingLayer, RetryLayer, ThrottleLayer};
//!
//! let executor = RuntimeExecutor::builder(provider)
//!     .layer(RetryLayer::new().with_max_tries(3))
//!     .layer(ThrottleLayer::max_concurrency(4)?)
//!     .layer(LoggingLayer::new())
//!     .finish();
//! ```

pub mod cache;
pub mod logging;
pub mod retry;
pub mod throttle;

// Re-exports
pub use cache::CacheLayer;
pub use logging::LoggingLayer;
pub use retry::RetryLayer;
pub use throttle::ThrottleLayer;
