//! Call-execution runtime.
//!
//! Sits between the convenience functions and the [`Provider`](crate::Provider)
//! trait:
//! - [`execute_standard_call`] and [`execute_stream_call`] resolve the
//!   observers of a call and emit its `started` and `finished` events
//! - [`RuntimeExecutor`] composes a provider with layers and observers

pub mod execute;
pub mod executor;

pub use execute::{
    execute_standard_call, execute_stream_call, CallContext, CallOutput, DeltaProcessor,
    Generated, StreamOutput,
};
pub use executor::{RuntimeExecutor, RuntimeExecutorBuilder};
