//! Tool domain module
//!
//! Every tool is described by a [`ToolDefinition`], invoked through a
//! [`ToolCall`] and answered with a [`ToolResult`].
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │ ToolSpec     │───▶│ ToolCall     │───▶│ ToolResult   │
//! │ (offered)    │    │ (invocation) │    │ (observation)│
//! └──────────────┘    └──────────────┘    └──────────────┘
//! ```

pub mod catalog;
pub mod entities;
pub mod value_objects;

pub use entities::{ToolCall, ToolDefinition, ToolParameter, ToolSpec};
pub use value_objects::{ToolError, ToolResult};
