//! Command execution tool: run_command
//!
//! Only offered when `tools.allow_commands` is set. Commands run through the
//! platform shell with the workspace root (or a directory inside it) as the
//! working directory.

use super::workspace::Workspace;
use conclave_domain::tool::{ToolCall, ToolDefinition, ToolError, ToolParameter, ToolResult};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

pub const RUN_COMMAND: &str = "run_command";

/// Maximum output size (1 MB)
const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

pub fn run_command_definition() -> ToolDefinition {
    ToolDefinition::new(
        RUN_COMMAND,
        "Execute a shell command in the workspace and return its output. Use with caution.",
    )
    .with_parameter(ToolParameter::new("command", "The command to execute", true))
    .with_parameter(
        ToolParameter::new(
            "working_dir",
            "Working directory inside the workspace (default: workspace root)",
            false,
        )
        .with_type("path"),
    )
    .with_parameter(
        ToolParameter::new("timeout_secs", "Timeout in seconds", false).with_type("integer"),
    )
}

pub async fn execute_run_command(
    workspace: &Workspace,
    call: &ToolCall,
    default_timeout: Duration,
) -> ToolResult {
    let start = Instant::now();

    let command_str = match call.require_string("command") {
        Ok(c) => c,
        Err(e) => return ToolResult::failure(RUN_COMMAND, ToolError::invalid_argument(e)),
    };

    let dir_str = call.get_string("working_dir").unwrap_or(".");
    let dir = match workspace.resolve(dir_str) {
        Ok(d) => d,
        Err(e) => return ToolResult::failure(RUN_COMMAND, e),
    };
    if !dir.is_dir() {
        return ToolResult::failure(
            RUN_COMMAND,
            ToolError::not_found(format!("Working directory does not exist: {}", dir_str)),
        );
    }

    // The agent may shorten the timeout, never extend it
    let timeout = call
        .get_i64("timeout_secs")
        .filter(|secs| *secs > 0)
        .map(|secs| Duration::from_secs(secs as u64).min(default_timeout))
        .unwrap_or(default_timeout);

    let mut cmd = if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", command_str]);
        c
    } else {
        let mut c = Command::new("sh");
        c.args(["-c", command_str]);
        c
    };
    cmd.current_dir(&dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            return ToolResult::failure(
                RUN_COMMAND,
                ToolError::execution_failed(format!("Failed to spawn command: {}", e)),
            );
        }
    };

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(o)) => o,
        Ok(Err(e)) => {
            return ToolResult::failure(
                RUN_COMMAND,
                ToolError::execution_failed(format!("Failed to wait for command: {}", e)),
            );
        }
        Err(_) => {
            return ToolResult::failure(
                RUN_COMMAND,
                ToolError::timeout(format!(
                    "command did not finish within {} seconds: {}",
                    timeout.as_secs(),
                    command_str
                )),
            );
        }
    };

    let exit_code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    let mut combined = String::new();
    combined.push_str(&stdout);
    if !stderr.is_empty() {
        if !combined.is_empty() {
            combined.push_str("\n--- stderr ---\n");
        }
        combined.push_str(&stderr);
    }
    if combined.len() > MAX_OUTPUT_SIZE {
        let mut cut = MAX_OUTPUT_SIZE;
        while !combined.is_char_boundary(cut) {
            cut -= 1;
        }
        combined.truncate(cut);
        combined.push_str("\n... (output truncated)");
    }

    // Non-zero exit is still an observation for the agent, not a tool failure
    let body = if output.status.success() {
        combined
    } else {
        format!("Command exited with code {}\n{}", exit_code, combined)
    };

    ToolResult::success(RUN_COMMAND, body).with_duration(start.elapsed().as_millis() as u64)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn test_run_command_echo() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path()).unwrap();
        let call = ToolCall::new(RUN_COMMAND).with_arg("command", "echo hello");
        let result = execute_run_command(&ws, &call, TIMEOUT).await;

        assert_eq!(result.output().map(str::trim), Some("hello"));
    }

    #[tokio::test]
    async fn test_run_command_runs_in_workspace() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let ws = Workspace::new(dir.path()).unwrap();
        let call = ToolCall::new(RUN_COMMAND).with_arg("command", "ls");
        let result = execute_run_command(&ws, &call, TIMEOUT).await;

        assert!(result.output().unwrap().contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_run_command_nonzero_exit() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path()).unwrap();
        let call = ToolCall::new(RUN_COMMAND).with_arg("command", "echo oops >&2; exit 3");
        let result = execute_run_command(&ws, &call, TIMEOUT).await;

        let output = result.output().unwrap();
        assert!(output.starts_with("Command exited with code 3"));
        assert!(output.contains("oops"));
    }

    #[tokio::test]
    async fn test_run_command_timeout() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path()).unwrap();
        let call = ToolCall::new(RUN_COMMAND)
            .with_arg("command", "sleep 5")
            .with_arg("timeout_secs", 1i64);
        let result = execute_run_command(&ws, &call, TIMEOUT).await;

        assert_eq!(result.error().unwrap().code, "TIMEOUT");
    }

    #[tokio::test]
    async fn test_run_command_working_dir_outside() {
        let dir = tempdir().unwrap();
        let ws = Workspace::new(dir.path()).unwrap();
        let call = ToolCall::new(RUN_COMMAND)
            .with_arg("command", "ls")
            .with_arg("working_dir", "..");
        let result = execute_run_command(&ws, &call, TIMEOUT).await;

        assert_eq!(result.error().unwrap().code, "PERMISSION_DENIED");
    }
}
