//! Workspace tools for agents
//!
//! Concrete implementations of the deterministic tools agents may call:
//! file reads and writes, directory listings, glob and grep searches, and
//! (opt-in) shell commands. Every path is confined to a [`Workspace`] root.

pub mod command;
pub mod file;
pub mod search;
pub mod workspace;

mod executor;

pub use executor::LocalToolExecutor;
pub use workspace::Workspace;

use conclave_domain::tool::ToolSpec;

/// Tools offered by default: everything except `run_command`.
pub fn workspace_tool_spec() -> ToolSpec {
    ToolSpec::new()
        .register(file::read_file_definition())
        .register(file::write_file_definition())
        .register(file::list_files_definition())
        .register(search::glob_search_definition())
        .register(search::grep_search_definition())
}
