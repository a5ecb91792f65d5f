//! Pattern definitions: ordered phases with a topology and a gate.

use crate::agent::AgentDefinition;
use crate::core::error::DomainError;
use crate::core::id::{AgentId, PatternId};
use serde::{Deserialize, Serialize};

/// How the participants of a phase interact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// One agent answers alone.
    Solo,
    /// Ordered chain; each output feeds the next agent.
    Sequential,
    /// Independent concurrent turns.
    Parallel,
    /// Repeat the sequential chain until the gate passes or the cap is hit.
    Loop,
    /// Manager delegates subtasks to workers and aggregates.
    Hierarchical,
    /// All-to-all exchange over several rounds.
    Network,
    /// Alternating turns with explicit rebuttals.
    Debate,
    /// Externally registered handler.
    Custom,
}

impl Topology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topology::Solo => "solo",
            Topology::Sequential => "sequential",
            Topology::Parallel => "parallel",
            Topology::Loop => "loop",
            Topology::Hierarchical => "hierarchical",
            Topology::Network => "network",
            Topology::Debate => "debate",
            Topology::Custom => "custom",
        }
    }
}

impl std::fmt::Display for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pass/fail rule evaluated at the end of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    /// Every participant with veto rights must approve.
    AllApproved,
    /// No blocking veto may be raised.
    NoVeto,
    #[default]
    Always,
}

impl Gate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gate::AllApproved => "all_approved",
            Gate::NoVeto => "no_veto",
            Gate::Always => "always",
        }
    }
}

impl std::fmt::Display for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which session participants take part in a phase.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParticipantSelection {
    #[default]
    All,
    /// Named agents, in the listed order.
    Agents { ids: Vec<AgentId> },
    /// Agents whose role label matches one of these (case-insensitive).
    Roles { roles: Vec<String> },
    /// The first `count` participants in session order.
    First { count: usize },
}

impl ParticipantSelection {
    /// Apply the rule to the session's ordered participant list.
    pub fn select(&self, participants: &[AgentDefinition]) -> Vec<AgentDefinition> {
        match self {
            ParticipantSelection::All => participants.to_vec(),
            ParticipantSelection::Agents { ids } => ids
                .iter()
                .filter_map(|id| participants.iter().find(|a| &a.id == id))
                .cloned()
                .collect(),
            ParticipantSelection::Roles { roles } => participants
                .iter()
                .filter(|a| roles.iter().any(|r| r.eq_ignore_ascii_case(&a.role)))
                .cloned()
                .collect(),
            ParticipantSelection::First { count } => {
                participants.iter().take(*count).cloned().collect()
            }
        }
    }
}

/// Topology-specific knobs. Unused fields are ignored by other topologies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyOptions {
    /// `loop`: maximum chain repetitions.
    pub max_iterations: usize,
    /// `debate`: rebuttal rounds after the opening statements.
    pub debate_rounds: usize,
    /// `network`: exchange rounds.
    pub network_rounds: usize,
    /// `custom`: registered handler name.
    pub handler: Option<String>,
}

impl Default for TopologyOptions {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            debate_rounds: 2,
            network_rounds: 2,
            handler: None,
        }
    }
}

/// One step of a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub id: String,
    pub topology: Topology,
    #[serde(default)]
    pub gate: Gate,
    #[serde(default)]
    pub participants: ParticipantSelection,
    /// What the participants should do in this phase.
    #[serde(default)]
    pub instruction: String,
    /// Turns each participant gets before an `all_approved` gate times out.
    #[serde(default = "default_turn_budget")]
    pub turn_budget: usize,
    #[serde(default)]
    pub options: TopologyOptions,
}

fn default_turn_budget() -> usize {
    1
}

impl Phase {
    pub fn new(id: impl Into<String>, topology: Topology) -> Self {
        Self {
            id: id.into(),
            topology,
            gate: Gate::Always,
            participants: ParticipantSelection::All,
            instruction: String::new(),
            turn_budget: default_turn_budget(),
            options: TopologyOptions::default(),
        }
    }

    pub fn with_gate(mut self, gate: Gate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_participants(mut self, selection: ParticipantSelection) -> Self {
        self.participants = selection;
        self
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn with_options(mut self, options: TopologyOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_turn_budget(mut self, turn_budget: usize) -> Self {
        self.turn_budget = turn_budget;
        self
    }
}

/// A named, ordered list of phases. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternDef {
    pub id: PatternId,
    #[serde(default)]
    pub name: String,
    pub phases: Vec<Phase>,
}

impl PatternDef {
    pub fn new(id: impl Into<PatternId>, phases: Vec<Phase>) -> Self {
        let id = id.into();
        Self {
            name: id.to_string(),
            id,
            phases,
        }
    }

    /// Structural checks that do not need the participant list.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.phases.is_empty() {
            return Err(DomainError::EmptyPattern(self.id.to_string()));
        }
        for phase in &self.phases {
            if phase.topology == Topology::Custom && phase.options.handler.is_none() {
                return Err(DomainError::InvalidDefinition(format!(
                    "custom phase '{}' names no handler",
                    phase.id
                )));
            }
            if phase.turn_budget == 0 {
                return Err(DomainError::InvalidDefinition(format!(
                    "phase '{}' has turn_budget = 0",
                    phase.id
                )));
            }
            if phase.topology == Topology::Loop && phase.options.max_iterations == 0 {
                return Err(DomainError::InvalidDefinition(format!(
                    "loop phase '{}' has max_iterations = 0",
                    phase.id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agents() -> Vec<AgentDefinition> {
        vec![
            AgentDefinition::new("lead", "lead", 10),
            AgentDefinition::new("dev", "developer", 40),
            AgentDefinition::new("qa", "QA", 50),
        ]
    }

    #[test]
    fn test_selection_all_and_first() {
        assert_eq!(ParticipantSelection::All.select(&agents()).len(), 3);
        let first = ParticipantSelection::First { count: 2 }.select(&agents());
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].id.as_str(), "dev");
    }

    #[test]
    fn test_selection_agents_keeps_listed_order() {
        let sel = ParticipantSelection::Agents {
            ids: vec!["qa".into(), "lead".into(), "ghost".into()],
        };
        let picked = sel.select(&agents());
        let ids: Vec<_> = picked.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["qa", "lead"]);
    }

    #[test]
    fn test_selection_roles_case_insensitive() {
        let sel = ParticipantSelection::Roles {
            roles: vec!["qa".to_string()],
        };
        assert_eq!(sel.select(&agents())[0].id.as_str(), "qa");
    }

    #[test]
    fn test_validate() {
        assert!(PatternDef::new("empty", vec![]).validate().is_err());
        let custom = PatternDef::new("c", vec![Phase::new("x", Topology::Custom)]);
        assert!(custom.validate().is_err());
        let no_turns = PatternDef::new(
            "t",
            vec![Phase::new("x", Topology::Solo).with_turn_budget(0)],
        );
        assert!(no_turns.validate().is_err());
        let ok = PatternDef::new("ok", vec![Phase::new("x", Topology::Solo)]);
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_phase_from_toml_like_json() {
        let phase: Phase = serde_json::from_str(
            r#"{"id":"review","topology":"parallel","gate":"no_veto",
                "participants":{"kind":"roles","roles":["qa"]}}"#,
        )
        .unwrap();
        assert_eq!(phase.topology, Topology::Parallel);
        assert_eq!(phase.gate, Gate::NoVeto);
        assert_eq!(phase.turn_budget, 1);
        assert_eq!(phase.options.max_iterations, 3);
    }
}
