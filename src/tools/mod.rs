//! Tool surface exposed to the calling agent.
//!
//! - [`adapter`]: the Context and Origin capabilities.
//! - [`definition`]: JSON-schema definitions and call/result shapes.
//! - [`executor`]: name-dispatching executor for function-calling agents.

pub mod adapter;
pub mod definition;
pub mod executor;

pub use adapter::{
    INVALID_COLLECTIONS, LANGUAGE_INSTRUCTION, ORIGIN_INSTRUCTION, ToolAdapter, ToolOutput,
};
pub use definition::{
    CONTEXT_TOOL, ORIGIN_TOOL, ToolCall, ToolDefinition, ToolResult, definitions,
};
pub use executor::ToolExecutor;
