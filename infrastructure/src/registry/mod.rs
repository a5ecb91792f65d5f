//! File-backed agent and pattern definitions

mod agents;
mod patterns;

pub use agents::{RegistryLoadError, TomlAgentRegistry};
pub use patterns::{PatternLoadError, check_agent_references, load_pattern, parse_pattern};
