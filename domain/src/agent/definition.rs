//! Agent definitions as loaded from the external registry.

use crate::core::id::AgentId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

/// Rank at or below which an agent counts as a lead (may approve over vetoes).
pub const LEAD_RANK: u32 = 20;
/// Rank at or below which an agent may delegate work to others.
pub const DELEGATE_RANK: u32 = 30;

/// Severity of the objections an agent is allowed to raise.
///
/// Ordered: `None < Advisory < Strong < Absolute`.
///
/// | Level | Blocks `no_veto` gate? | Overridable? |
/// |-------|------------------------|--------------|
/// | `none` | no veto rights | - |
/// | `advisory` | never | recorded only |
/// | `strong` | yes | by a more senior approver |
/// | `absolute` | yes | never |
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum VetoLevel {
    #[default]
    None,
    Advisory,
    Strong,
    Absolute,
}

impl VetoLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            VetoLevel::None => "none",
            VetoLevel::Advisory => "advisory",
            VetoLevel::Strong => "strong",
            VetoLevel::Absolute => "absolute",
        }
    }

    /// Whether a veto at this level blocks a `no_veto` gate.
    pub fn blocks(&self) -> bool {
        matches!(self, VetoLevel::Strong | VetoLevel::Absolute)
    }
}

impl std::fmt::Display for VetoLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VetoLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "" => Ok(VetoLevel::None),
            "advisory" => Ok(VetoLevel::Advisory),
            "strong" => Ok(VetoLevel::Strong),
            "absolute" => Ok(VetoLevel::Absolute),
            other => Err(format!("unknown veto level: {}", other)),
        }
    }
}

/// An LLM-backed worker taking part in sessions.
///
/// Immutable once loaded. The core reads definitions but never writes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub id: AgentId,
    /// Free-form role label ("architect", "qa", "developer", ...)
    pub role: String,
    /// Hierarchy rank; lower is more senior.
    pub rank: u32,
    #[serde(default)]
    pub veto_level: VetoLevel,
    /// Names of the tools this agent may call.
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    /// System persona text.
    #[serde(default)]
    pub persona: String,
    /// Optional model hint passed through to the provider chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl AgentDefinition {
    pub fn new(id: impl Into<AgentId>, role: impl Into<String>, rank: u32) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            rank,
            veto_level: VetoLevel::None,
            capabilities: BTreeSet::new(),
            persona: String::new(),
            model: None,
        }
    }

    pub fn with_veto_level(mut self, level: VetoLevel) -> Self {
        self.veto_level = level;
        self
    }

    pub fn with_capability(mut self, tool: impl Into<String>) -> Self {
        self.capabilities.insert(tool.into());
        self
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn can_veto(&self) -> bool {
        self.veto_level != VetoLevel::None
    }

    /// Agents with strong veto rights or lead rank may approve.
    pub fn can_approve(&self) -> bool {
        self.veto_level >= VetoLevel::Strong || self.rank <= LEAD_RANK
    }

    pub fn can_delegate(&self) -> bool {
        self.rank <= DELEGATE_RANK
    }

    pub fn has_capability(&self, tool: &str) -> bool {
        self.capabilities.contains(tool)
    }

    /// Whether this agent outranks `other` in the hierarchy.
    pub fn is_senior_to(&self, other: &AgentDefinition) -> bool {
        self.rank < other.rank
    }

    /// Manager heuristic used by hierarchical phases.
    pub fn is_manager(&self) -> bool {
        let role = self.role.to_lowercase();
        role.contains("lead") || role.contains("manager") || self.rank <= LEAD_RANK
    }

    /// Quality-assurance heuristic used by hierarchical phases.
    pub fn is_qa(&self) -> bool {
        let role = self.role.to_lowercase();
        role.contains("qa") || role.contains("test")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_veto_level_ordering() {
        assert!(VetoLevel::None < VetoLevel::Advisory);
        assert!(VetoLevel::Advisory < VetoLevel::Strong);
        assert!(VetoLevel::Strong < VetoLevel::Absolute);
        assert!(!VetoLevel::Advisory.blocks());
        assert!(VetoLevel::Strong.blocks());
    }

    #[test]
    fn test_veto_level_from_str() {
        assert_eq!("ABSOLUTE".parse::<VetoLevel>().unwrap(), VetoLevel::Absolute);
        assert_eq!("".parse::<VetoLevel>().unwrap(), VetoLevel::None);
        assert!("maybe".parse::<VetoLevel>().is_err());
    }

    #[test]
    fn test_permissions() {
        let lead = AgentDefinition::new("lead", "tech lead", 10);
        let dev = AgentDefinition::new("dev", "developer", 50).with_veto_level(VetoLevel::Advisory);
        let security = AgentDefinition::new("sec", "security", 40)
            .with_veto_level(VetoLevel::Absolute);

        assert!(lead.can_approve());
        assert!(lead.can_delegate());
        assert!(!lead.can_veto());

        assert!(dev.can_veto());
        assert!(!dev.can_approve());
        assert!(!dev.can_delegate());

        assert!(security.can_approve());
        assert!(lead.is_senior_to(&security));
    }

    #[test]
    fn test_role_heuristics() {
        assert!(AgentDefinition::new("a", "Team Lead", 30).is_manager());
        assert!(AgentDefinition::new("b", "QA engineer", 50).is_qa());
        assert!(!AgentDefinition::new("c", "developer", 50).is_manager());
    }

    #[test]
    fn test_deserialize_defaults() {
        let agent: AgentDefinition =
            serde_json::from_str(r#"{"id":"x","role":"dev","rank":40}"#).unwrap();
        assert_eq!(agent.veto_level, VetoLevel::None);
        assert!(agent.capabilities.is_empty());
    }
}
