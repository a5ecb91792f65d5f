//! Executor and exploration parameters - use case loop control.
//!
//! These are application-layer concerns, not domain policy. The
//! infrastructure config loader fills them from the `[engine]` and
//! `[exploration]` sections.

use conclave_domain::exploration::{DEFAULT_FINDINGS_CAP, MAX_ITERATIONS, MAX_QUERIES};
use std::time::Duration;

/// Tool-calling loop control for one agent turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorParams {
    /// Maximum provider round trips in a single turn.
    pub max_tool_rounds: usize,
    /// Timeout for the memory lookup injected into the prompt.
    pub memory_timeout: Duration,
    /// Memory scope used when the caller gives none.
    pub memory_scope: String,
    /// Snippets injected at most.
    pub memory_snippets: usize,
}

impl Default for ExecutorParams {
    fn default() -> Self {
        Self {
            max_tool_rounds: 12,
            memory_timeout: Duration::from_secs(5),
            memory_scope: "project".to_string(),
            memory_snippets: 5,
        }
    }
}

impl ExecutorParams {
    pub fn with_max_tool_rounds(mut self, max: usize) -> Self {
        self.max_tool_rounds = max.max(1);
        self
    }

    pub fn with_memory_timeout(mut self, timeout: Duration) -> Self {
        self.memory_timeout = timeout;
        self
    }

    pub fn with_memory_scope(mut self, scope: impl Into<String>) -> Self {
        self.memory_scope = scope.into();
        self
    }
}

/// Bounds of the exploration sub-loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExplorationParams {
    pub max_iterations: usize,
    pub max_queries: usize,
    pub findings_cap: usize,
}

impl Default for ExplorationParams {
    fn default() -> Self {
        Self {
            max_iterations: MAX_ITERATIONS,
            max_queries: MAX_QUERIES,
            findings_cap: DEFAULT_FINDINGS_CAP,
        }
    }
}

impl ExplorationParams {
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.clamp(1, MAX_ITERATIONS);
        self
    }

    pub fn with_findings_cap(mut self, cap: usize) -> Self {
        self.findings_cap = cap;
        self
    }
}
