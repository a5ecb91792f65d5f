//! Tool Executor port
//!
//! Workspace tools (file reads, searches, commands) are deterministic
//! functions `(args) -> result | error`. Errors come back inside the
//! [`ToolResult`] and are shown to the agent, never raised.

use async_trait::async_trait;
use conclave_domain::tool::{ToolCall, ToolDefinition, ToolResult, ToolSpec};

/// Port for tool execution
#[async_trait]
pub trait ToolExecutorPort: Send + Sync {
    /// Specification of all tools this executor provides
    fn tool_spec(&self) -> &ToolSpec;

    fn has_tool(&self, name: &str) -> bool {
        self.tool_spec().contains(name)
    }

    fn get_tool(&self, name: &str) -> Option<&ToolDefinition> {
        self.tool_spec().get(name)
    }

    /// Execute a tool call
    async fn execute(&self, call: &ToolCall) -> ToolResult;
}

/// Executor without any tools, for agents that only reason.
#[derive(Debug, Default)]
pub struct NoTools {
    spec: ToolSpec,
}

#[async_trait]
impl ToolExecutorPort for NoTools {
    fn tool_spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        ToolResult::failure(
            &call.tool_name,
            conclave_domain::ToolError::not_found(&call.tool_name),
        )
    }
}
