//! Provider-specific request strategies.

pub mod json_output;

pub use json_output::{
    detect_json_strategy, InstructionPlacement, JsonModeStrategy, JsonOutputStrategy,
    JsonSchemaStrategy,
};
