//! # aifuse core
//!
//! Provider-agnostic building blocks for calling AI models from Rust.
//!
//! - [`Provider`]: the trait a vendor binding implements
//! - [`Layer`]: wrappers adding cross-cutting behaviour to a provider
//! - [`function`]: `generate_text`, `stream_text`, `generate_object`,
//!   `embed_many` and the other convenience functions
//! - [`runtime`]: the event-emitting call pipeline and [`RuntimeExecutor`]
//! - [`api`]: HTTP helpers with retry and throttling for provider bindings

pub mod abort;
pub mod api;
pub mod call;
pub mod config;
pub mod error;
pub mod event;
pub mod function;
pub mod layer;
pub mod logging;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod provider;
pub mod queue;
pub mod retry;
pub mod run;
pub mod runtime;
pub mod schema;
pub mod strategy;
pub mod throttle;
pub mod types;

// Re-exports
pub use abort::AbortSignal;
pub use config::LogFormat;
pub use error::{AiError, ApiCallError, RetryError, RetryErrorReason};
pub use event::{FunctionEvent, FunctionObserver, FunctionResult, FunctionType};
pub use function::FunctionOptions;
pub use layer::{Layer, LayeredProvider};
pub use provider::{Capability, Provider};
pub use queue::AsyncQueue;
pub use retry::RetryStrategy;
pub use run::Run;
pub use runtime::{RuntimeExecutor, RuntimeExecutorBuilder};
pub use schema::{schema_of, JsonSchemaOf, Schema, UncheckedSchema};
pub use strategy::{JsonModeStrategy, JsonOutputStrategy, JsonSchemaStrategy};
pub use throttle::ThrottleStrategy;
pub use types::*;

/// Result type alias for AI operations
pub type Result<T> = std::result::Result<T, AiError>;
