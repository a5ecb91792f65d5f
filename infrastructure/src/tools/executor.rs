//! Local tool executor, the concrete implementation of [`ToolExecutorPort`].
//!
//! ```text
//! ToolExecutorPort::execute()
//!   ├─ unknown tool          → NOT_FOUND
//!   ├─ missing/invalid args  → INVALID_ARGUMENT
//!   ├─ run_command           → command::execute_run_command (async, timeout)
//!   └─ otherwise             → file / search (blocking pool)
//! ```
//!
//! All paths are confined to the [`Workspace`] root.

use async_trait::async_trait;
use conclave_application::ports::tool_executor::ToolExecutorPort;
use conclave_domain::tool::{ToolCall, ToolDefinition, ToolError, ToolResult, ToolSpec};
use std::io;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use super::workspace::Workspace;
use super::{command, file, search};
use crate::config::FileToolsConfig;

/// Executor that runs workspace tools on the local machine.
///
/// | Constructor | Tools |
/// |-------------|-------|
/// | [`new()`](Self::new) | read_file, write_file, list_files, glob_search, grep_search |
/// | [`with_commands()`](Self::with_commands) | adds run_command |
/// | [`from_config()`](Self::from_config) | per `[tools]` |
#[derive(Debug, Clone)]
pub struct LocalToolExecutor {
    tool_spec: ToolSpec,
    workspace: Workspace,
    command_timeout: Duration,
}

impl LocalToolExecutor {
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self {
            tool_spec: super::workspace_tool_spec(),
            workspace: Workspace::new(root)?,
            command_timeout: Duration::from_secs(60),
        })
    }

    /// Also offer `run_command`, bounded by `timeout`.
    pub fn with_commands(mut self, timeout: Duration) -> Self {
        self.tool_spec = self.tool_spec.register(command::run_command_definition());
        self.command_timeout = timeout;
        self
    }

    /// Build from the `[tools]` section; the workspace defaults to the
    /// current directory.
    pub fn from_config(config: &FileToolsConfig) -> io::Result<Self> {
        let root = match &config.workspace {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        let executor = Self::new(root)?;
        Ok(if config.allow_commands {
            executor.with_commands(Duration::from_secs(config.command_timeout_secs))
        } else {
            executor
        })
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    fn run_blocking(workspace: &Workspace, call: &ToolCall) -> ToolResult {
        match call.tool_name.as_str() {
            file::READ_FILE => file::execute_read_file(workspace, call),
            file::WRITE_FILE => file::execute_write_file(workspace, call),
            file::LIST_FILES => file::execute_list_files(workspace, call),
            search::GLOB_SEARCH => search::execute_glob_search(workspace, call),
            search::GREP_SEARCH => search::execute_grep_search(workspace, call),
            _ => ToolResult::failure(
                &call.tool_name,
                ToolError::execution_failed(format!(
                    "Tool '{}' is not implemented",
                    call.tool_name
                )),
            ),
        }
    }
}

/// Check required parameters, enumerated values and basic types.
fn validate(call: &ToolCall, definition: &ToolDefinition) -> Result<(), String> {
    for param in &definition.parameters {
        let Some(value) = call.arguments.get(&param.name).filter(|v| !v.is_null()) else {
            if param.required {
                return Err(format!("Missing required argument: {}", param.name));
            }
            continue;
        };

        let type_ok = match param.param_type.as_str() {
            "integer" => value.is_i64() || value.is_u64(),
            "number" => value.is_number(),
            "boolean" => value.is_boolean(),
            "array" => value.is_array(),
            _ => value.is_string(),
        };
        if !type_ok {
            return Err(format!(
                "Argument '{}' must be of type {}",
                param.name, param.param_type
            ));
        }

        if !param.allowed.is_empty()
            && let Some(s) = value.as_str()
            && !param.allowed.iter().any(|a| a == s)
        {
            return Err(format!(
                "Argument '{}' must be one of: {}",
                param.name,
                param.allowed.join(", ")
            ));
        }
    }
    Ok(())
}

#[async_trait]
impl ToolExecutorPort for LocalToolExecutor {
    fn tool_spec(&self) -> &ToolSpec {
        &self.tool_spec
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let Some(definition) = self.tool_spec.get(&call.tool_name) else {
            return ToolResult::failure(
                &call.tool_name,
                ToolError::not_found(format!("Unknown tool: {}", call.tool_name)),
            );
        };
        if let Err(e) = validate(call, definition) {
            return ToolResult::failure(&call.tool_name, ToolError::invalid_argument(e));
        }

        debug!(tool = %call.tool_name, "Executing workspace tool");

        if call.tool_name == command::RUN_COMMAND {
            return command::execute_run_command(&self.workspace, call, self.command_timeout)
                .await;
        }

        let workspace = self.workspace.clone();
        let owned = call.clone();
        match tokio::task::spawn_blocking(move || Self::run_blocking(&workspace, &owned)).await {
            Ok(result) => result,
            Err(e) => ToolResult::failure(
                &call.tool_name,
                ToolError::execution_failed(format!("Tool task failed: {}", e)),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_default_spec_has_no_commands() {
        let dir = tempdir().unwrap();
        let executor = LocalToolExecutor::new(dir.path()).unwrap();

        assert!(executor.has_tool("read_file"));
        assert!(executor.has_tool("list_files"));
        assert!(!executor.has_tool("run_command"));

        let result = executor
            .execute(&ToolCall::new("run_command").with_arg("command", "ls"))
            .await;
        assert_eq!(result.error().unwrap().code, "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let dir = tempdir().unwrap();
        let executor = LocalToolExecutor::new(dir.path()).unwrap();

        let missing = executor.execute(&ToolCall::new("read_file")).await;
        assert_eq!(missing.error().unwrap().code, "INVALID_ARGUMENT");
        assert!(missing.error().unwrap().message.contains("path"));

        let wrong_type = executor
            .execute(
                &ToolCall::new("read_file")
                    .with_arg("path", "a.txt")
                    .with_arg("limit", "ten"),
            )
            .await;
        assert_eq!(wrong_type.error().unwrap().code, "INVALID_ARGUMENT");
    }

    #[tokio::test]
    async fn test_write_then_read_roundtrip() {
        let dir = tempdir().unwrap();
        let executor = LocalToolExecutor::new(dir.path()).unwrap();

        let write = executor
            .execute(
                &ToolCall::new("write_file")
                    .with_arg("path", "docs/plan.md")
                    .with_arg("content", "step one")
                    .with_arg("create_dirs", true),
            )
            .await;
        assert!(write.is_success());

        let read = executor
            .execute(&ToolCall::new("read_file").with_arg("path", "docs/plan.md"))
            .await;
        assert_eq!(read.output(), Some("step one"));
    }

    #[tokio::test]
    async fn test_from_config_enables_commands() {
        let dir = tempdir().unwrap();
        let config = FileToolsConfig {
            workspace: Some(dir.path().to_path_buf()),
            allow_commands: true,
            command_timeout_secs: 5,
        };
        let executor = LocalToolExecutor::from_config(&config).unwrap();

        assert!(executor.has_tool("run_command"));
        assert_eq!(executor.command_timeout, Duration::from_secs(5));
    }
}
