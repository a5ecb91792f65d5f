//! Tool execution results and errors.
//!
//! Tool errors are observations, not failures: the executor renders them
//! back into the agent's context via [`ToolResult::to_observation`] and the
//! agent decides how to proceed.

use serde::{Deserialize, Serialize};

/// Error that occurred during tool execution.
///
/// | Code | Meaning |
/// |------|---------|
/// | `INVALID_ARGUMENT` | Missing or malformed parameters |
/// | `NOT_FOUND` | Unknown tool or missing resource |
/// | `EXECUTION_FAILED` | Runtime failure (I/O, non-zero exit) |
/// | `PERMISSION_DENIED` | Tool not granted to the agent, or path outside the workspace |
/// | `TIMEOUT` | Operation timed out |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolError {
    pub code: String,
    pub message: String,
}

impl ToolError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", format!("Resource not found: {}", resource.into()))
    }

    pub fn permission_denied(resource: impl Into<String>) -> Self {
        Self::new(
            "PERMISSION_DENIED",
            format!("Permission denied: {}", resource.into()),
        )
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new("INVALID_ARGUMENT", message)
    }

    pub fn execution_failed(message: impl Into<String>) -> Self {
        Self::new("EXECUTION_FAILED", message)
    }

    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::new(
            "TIMEOUT",
            format!("Operation timed out: {}", operation.into()),
        )
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ToolError {}

/// Result of a tool execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_name: String,
    pub outcome: Result<String, ToolError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// For search tools: number of matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_count: Option<usize>,
}

impl ToolResult {
    pub fn success(tool_name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            outcome: Ok(output.into()),
            duration_ms: None,
            match_count: None,
        }
    }

    pub fn failure(tool_name: impl Into<String>, error: ToolError) -> Self {
        Self {
            tool_name: tool_name.into(),
            outcome: Err(error),
            duration_ms: None,
            match_count: None,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_match_count(mut self, count: usize) -> Self {
        self.match_count = Some(count);
        self
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn output(&self) -> Option<&str> {
        self.outcome.as_ref().ok().map(String::as_str)
    }

    pub fn error(&self) -> Option<&ToolError> {
        self.outcome.as_ref().err()
    }

    /// Text fed back into the agent's context.
    pub fn to_observation(&self) -> String {
        match &self.outcome {
            Ok(output) => output.clone(),
            Err(error) => format!("ERROR {}", error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_observation() {
        let result = ToolResult::success("read_file", "contents").with_duration(3);
        assert!(result.is_success());
        assert_eq!(result.output(), Some("contents"));
        assert_eq!(result.to_observation(), "contents");
    }

    #[test]
    fn test_failure_observation() {
        let result = ToolResult::failure("write_file", ToolError::permission_denied("/etc/passwd"));
        assert!(!result.is_success());
        assert_eq!(result.error().unwrap().code, "PERMISSION_DENIED");
        assert_eq!(
            result.to_observation(),
            "ERROR [PERMISSION_DENIED] Permission denied: /etc/passwd"
        );
    }
}
