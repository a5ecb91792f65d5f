//! Pattern definition files.
//!
//! A pattern is a TOML (or JSON, by extension) rendering of [`PatternDef`]:
//!
//! ```toml
//! id = "feature-review"
//! name = "Feature review"
//!
//! [[phases]]
//! id = "design"
//! topology = "sequential"
//!
//! [[phases]]
//! id = "review"
//! topology = "parallel"
//! gate = "no_veto"
//! participants = { kind = "roles", roles = ["qa engineer"] }
//! ```

use conclave_application::ports::agent_registry::AgentRegistry;
use conclave_domain::{DomainError, ParticipantSelection, PatternDef};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PatternLoadError {
    #[error("Failed to read pattern file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse pattern file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Phase id '{0}' is used more than once")]
    DuplicatePhase(String),

    #[error(transparent)]
    Invalid(#[from] DomainError),
}

pub fn load_pattern(path: &Path) -> Result<PatternDef, PatternLoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| PatternLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let parsed = if is_json {
        serde_json::from_str::<PatternDef>(&content).map_err(|e| e.to_string())
    } else {
        toml::from_str::<PatternDef>(&content).map_err(|e| e.to_string())
    };
    let pattern = parsed.map_err(|message| PatternLoadError::Parse {
        path: path.to_path_buf(),
        message,
    })?;

    check_pattern(pattern)
}

pub fn parse_pattern(content: &str) -> Result<PatternDef, PatternLoadError> {
    let pattern = toml::from_str::<PatternDef>(content).map_err(|e| PatternLoadError::Parse {
        path: PathBuf::new(),
        message: e.to_string(),
    })?;
    check_pattern(pattern)
}

fn check_pattern(mut pattern: PatternDef) -> Result<PatternDef, PatternLoadError> {
    pattern.validate()?;

    let mut seen = HashSet::new();
    for phase in &pattern.phases {
        if !seen.insert(phase.id.as_str()) {
            return Err(PatternLoadError::DuplicatePhase(phase.id.clone()));
        }
    }

    if pattern.name.is_empty() {
        pattern.name = pattern.id.to_string();
    }
    Ok(pattern)
}

/// Check that every agent a phase names explicitly exists in `registry`.
pub fn check_agent_references(
    pattern: &PatternDef,
    registry: &dyn AgentRegistry,
) -> Result<(), DomainError> {
    for phase in &pattern.phases {
        if let ParticipantSelection::Agents { ids } = &phase.participants {
            for id in ids {
                if registry.get_agent(id).is_err() {
                    return Err(DomainError::UnknownAgent(format!(
                        "{} (phase '{}')",
                        id, phase.id
                    )));
                }
            }
        }
    }
    Ok(())
}
