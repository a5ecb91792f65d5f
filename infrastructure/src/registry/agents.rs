//! Agent registry backed by a TOML file.
//!
//! ```toml
//! [[agents]]
//! id = "lead"
//! role = "tech lead"
//! rank = 10
//! veto_level = "strong"
//! capabilities = ["read_file", "grep_search", "deep_search"]
//! persona = "You keep the team focused on shipping."
//! model = "gpt-4o"
//! ```

use conclave_application::ports::agent_registry::{AgentRegistry, RegistryError};
use conclave_domain::{AgentDefinition, AgentId};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum RegistryLoadError {
    #[error("Failed to read agents file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse agents file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Agent '{0}' is defined more than once")]
    Duplicate(AgentId),

    #[error("Agent #{index} is invalid: {reason}")]
    Invalid { index: usize, reason: String },
}

#[derive(Debug, Deserialize)]
struct AgentsFile {
    #[serde(default)]
    agents: Vec<AgentDefinition>,
}

/// Read-only registry loaded once from an agents file.
#[derive(Debug, Clone, Default)]
pub struct TomlAgentRegistry {
    agents: HashMap<AgentId, AgentDefinition>,
    order: Vec<AgentId>,
}

impl TomlAgentRegistry {
    pub fn load(path: &Path) -> Result<Self, RegistryLoadError> {
        let content = std::fs::read_to_string(path).map_err(|source| RegistryLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let registry = Self::from_toml_str(&content).map_err(|e| match e {
            RegistryLoadError::Parse { source, .. } => RegistryLoadError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        info!("Loaded {} agents from {}", registry.len(), path.display());
        Ok(registry)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, RegistryLoadError> {
        let file: AgentsFile = toml::from_str(content).map_err(|source| RegistryLoadError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        Self::from_definitions(file.agents)
    }

    pub fn from_definitions(
        definitions: Vec<AgentDefinition>,
    ) -> Result<Self, RegistryLoadError> {
        let mut registry = Self::default();
        for (index, agent) in definitions.into_iter().enumerate() {
            if agent.id.as_str().trim().is_empty() {
                return Err(RegistryLoadError::Invalid {
                    index,
                    reason: "id is empty".to_string(),
                });
            }
            if agent.role.trim().is_empty() {
                return Err(RegistryLoadError::Invalid {
                    index,
                    reason: format!("agent '{}' has no role", agent.id),
                });
            }
            if registry.agents.contains_key(&agent.id) {
                return Err(RegistryLoadError::Duplicate(agent.id));
            }
            registry.order.push(agent.id.clone());
            registry.agents.insert(agent.id.clone(), agent);
        }
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Agent ids in file order.
    pub fn ids(&self) -> &[AgentId] {
        &self.order
    }
}

impl AgentRegistry for TomlAgentRegistry {
    fn get_agent(&self, id: &AgentId) -> Result<AgentDefinition, RegistryError> {
        self.agents
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.clone()))
    }
}
