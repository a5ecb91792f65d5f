//! Logging, memory and tool settings from TOML
//!
//! ```toml
//! [logging]
//! events_dir = "~/.local/share/conclave/sessions"
//!
//! [memory]
//! notes_dir = "docs/notes"
//!
//! [tools]
//! allow_commands = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Diagnostics and event log (`[logging]`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// Directory for per-session JSONL event logs. No event log when unset.
    pub events_dir: Option<PathBuf>,
    /// Directory for the daily-rolling diagnostic log file.
    pub log_dir: Option<PathBuf>,
}

/// Project memory (`[memory]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileMemoryConfig {
    /// Directory of markdown/text notes searched for prompt snippets.
    pub notes_dir: Option<PathBuf>,
    /// Scope used when a turn names none.
    pub default_scope: String,
    pub max_snippets: usize,
}

impl Default for FileMemoryConfig {
    fn default() -> Self {
        Self {
            notes_dir: None,
            default_scope: "project".to_string(),
            max_snippets: 5,
        }
    }
}

/// Workspace tools (`[tools]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileToolsConfig {
    /// Root every file tool is confined to. Defaults to the working directory.
    pub workspace: Option<PathBuf>,
    /// Offer `run_command` to agents that have the capability.
    pub allow_commands: bool,
    pub command_timeout_secs: u64,
}

impl Default for FileToolsConfig {
    fn default() -> Self {
        Self {
            workspace: None,
            allow_commands: false,
            command_timeout_secs: 60,
        }
    }
}
