//! # aifuse
//!
//! Unified client layer over AI model provider APIs.
//!
//! aifuse puts every provider behind one [`Provider`] trait and runs each
//! call through the same pipeline: retry and throttling, lifecycle events
//! for observers, and typed results for text, objects, embeddings, speech,
//! transcription and images.
//!
//! ## Features
//!
//! - **Composable layers**: stack logging, retry, throttling and caching
//!   around any provider
//! - **Observable calls**: every function emits `started`/`finished` events
//!   to global, executor, run and per-call observers
//! - **Streaming**: text and speech streams that can be consumed by any
//!   number of readers
//! - **Structured output**: `generate_object` validates model output
//!   against a JSON schema
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! aifuse = { version = "0.1", features = ["layers", "observers"] }
//! ```
//!
//! ```ignore
//! use aifuse::prelude::*;
//!
//! # async fn example(provider: impl Provider) -> aifuse::Result<()> {
//! let executor = RuntimeExecutor::builder(provider)
//!     .layer(RetryLayer::new())
//!     .layer(LoggingLayer::new())
//!     .finish();
//!
//! let result = executor
//!     .generate_text("my-model", TextParams::prompt("What is Rust?"), FunctionOptions::new())
//!     .await?;
//! println!("{}", result.content);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `default`: `layers` and `observers`
//! - `layers`: built-in provider layers (logging, retry, throttle, cache)
//! - `observers`: built-in function observers (usage tracking, recording)
//! - `schema`: re-exports `schemars` for deriving JSON schemas
//! - `mock`: in-memory mock provider
//! - `full`: all of the above except `mock`

// Re-export core types and traits
pub use aifuse_core::*;

// Re-export layers under `layer` module
#[cfg(feature = "aifuse-layer")]
pub mod layer {
    //! Provider layers: the [`Layer`] trait and the built-in layers.
    pub use aifuse_core::layer::*;
    pub use aifuse_layer::*;
}

// Re-export observers under `observer` module
#[cfg(feature = "aifuse-observer")]
pub mod observer {
    //! Built-in function observers.
    pub use aifuse_observer::*;
}

// Re-export schemars when schema feature is enabled
#[cfg(feature = "schema")]
pub mod schemars {
    pub use ::schemars::*;
}

/// Prelude module for convenient imports
pub mod prelude {
    //! Prelude module containing the most commonly used types and traits.
    //!
    //! ```
    //! use aifuse::prelude::*;
    //! ```

    pub use crate::{
        AbortSignal, AiError, FunctionObserver, FunctionOptions, Layer, Message, Provider,
        Result, Role, Run, RuntimeExecutor, TextParams, Usage,
    };

    #[cfg(feature = "aifuse-layer")]
    pub use crate::layer::{CacheLayer, LoggingLayer, RetryLayer, ThrottleLayer};

    #[cfg(feature = "aifuse-observer")]
    pub use crate::observer::*;
}
