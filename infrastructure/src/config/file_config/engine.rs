//! Engine, exploration and bus configuration from TOML
//!
//! ```toml
//! [engine]
//! max_tool_rounds = 12
//! turn_retry_budget = 1
//! negotiation_rounds = 3
//! marker_fallback = true
//!
//! [exploration]
//! max_iterations = 10
//!
//! [bus]
//! session_capacity = 2000
//! ```

use serde::{Deserialize, Serialize};

/// Pattern engine and turn executor settings (`[engine]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileEngineConfig {
    /// Provider round trips per agent turn.
    pub max_tool_rounds: usize,
    /// Extra attempts for a turn that hit the round cap.
    pub turn_retry_budget: usize,
    /// Negotiate when a gate blocks.
    pub negotiate_on_block: bool,
    /// At most 3.
    pub negotiation_rounds: usize,
    /// Accept `[VETO]` / `[APPROVE]` style markers when no structured
    /// decision was submitted.
    pub marker_fallback: bool,
    pub memory_timeout_secs: u64,
    /// Bytes of prior-phase output carried into the next phase.
    pub context_budget: usize,
    pub compressed_output_size: usize,
    /// Repeat vetoes by one agent inside this window count as advisory.
    pub veto_cooldown_secs: i64,
    /// Let senior approvers override `strong` vetoes.
    pub allow_veto_override: bool,
}

impl Default for FileEngineConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: 12,
            turn_retry_budget: 1,
            negotiate_on_block: true,
            negotiation_rounds: 3,
            marker_fallback: true,
            memory_timeout_secs: 5,
            context_budget: 6_000,
            compressed_output_size: 400,
            veto_cooldown_secs: 60,
            allow_veto_override: true,
        }
    }
}

/// Exploration sub-loop bounds (`[exploration]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileExplorationConfig {
    /// At most 10.
    pub max_iterations: usize,
    /// Sub-queries issued per iteration, at most 3.
    pub max_queries: usize,
    /// Total bytes of findings kept.
    pub findings_cap: usize,
}

impl Default for FileExplorationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_queries: 3,
            findings_cap: 8_000,
        }
    }
}

/// Message bus capacities (`[bus]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileBusConfig {
    pub session_capacity: usize,
    pub dead_letter_cap: usize,
    pub global_capacity: usize,
}

impl Default for FileBusConfig {
    fn default() -> Self {
        Self {
            session_capacity: 2_000,
            dead_letter_cap: 1_000,
            global_capacity: 256,
        }
    }
}
