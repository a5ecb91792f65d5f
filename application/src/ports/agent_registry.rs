//! Agent registry port
//!
//! Definitions are owned by an external store; the core only reads them,
//! once per session start.

use conclave_domain::{AgentDefinition, AgentId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Agent not found: {0}")]
    NotFound(AgentId),

    #[error("Registry unavailable: {0}")]
    Unavailable(String),
}

pub trait AgentRegistry: Send + Sync {
    fn get_agent(&self, id: &AgentId) -> Result<AgentDefinition, RegistryError>;

    /// Resolve several agents, preserving order.
    fn get_agents(&self, ids: &[AgentId]) -> Result<Vec<AgentDefinition>, RegistryError> {
        ids.iter().map(|id| self.get_agent(id)).collect()
    }
}
