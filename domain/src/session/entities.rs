//! Session entity: one run of a pattern over a set of agents.

use crate::agent::AgentDefinition;
use crate::core::error::DomainError;
use crate::core::id::{AgentId, PatternId, SessionId};
use crate::message::{Decision, DecisionSource};
use crate::negotiation::NegotiationOutcome;
use crate::pattern::{Gate, Topology};
use crate::veto::{GateDecision, VetoRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a session.
///
/// ```text
/// pending ──▶ running ──▶ completed
///    │           ├──────▶ blocked
///    └───────────┴──────▶ failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Pending,
    Running,
    Blocked,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Running => "running",
            SessionStatus::Blocked => "blocked",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Blocked | SessionStatus::Completed | SessionStatus::Failed
        )
    }

    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Failed)
                | (Running, Completed)
                | (Running, Blocked)
                | (Running, Failed)
        )
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recorded reason for a `blocked` or `failed` session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum SessionCause {
    /// A gate blocked and negotiation did not accept a resolution.
    GateBlocked {
        phase: String,
        reason: String,
        negotiation: Option<NegotiationOutcome>,
    },
    /// Every provider was cooling down or failing.
    ProviderExhausted { phase: String, detail: String },
    /// Cancelled at a phase boundary.
    Cancelled { phase_index: usize },
    /// The pattern or participants could not be run.
    Invalid { detail: String },
    /// A custom handler or other phase-level failure.
    PhaseFailed { phase: String, detail: String },
}

impl std::fmt::Display for SessionCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionCause::GateBlocked {
                phase,
                reason,
                negotiation,
            } => {
                write!(f, "gate blocked in phase '{}': {}", phase, reason)?;
                if let Some(outcome) = negotiation {
                    write!(f, " (negotiation {})", outcome)?;
                }
                Ok(())
            }
            SessionCause::ProviderExhausted { phase, detail } => {
                write!(f, "providers exhausted in phase '{}': {}", phase, detail)
            }
            SessionCause::Cancelled { phase_index } => {
                write!(f, "cancelled before phase {}", phase_index)
            }
            SessionCause::Invalid { detail } => write!(f, "invalid session: {}", detail),
            SessionCause::PhaseFailed { phase, detail } => {
                write!(f, "phase '{}' failed: {}", phase, detail)
            }
        }
    }
}

/// One agent turn as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub agent: AgentId,
    pub output: String,
    pub decision: Decision,
    pub decision_source: DecisionSource,
    /// `false` when the round cap was hit before a final answer.
    pub complete: bool,
    pub rounds: usize,
    pub attempts: usize,
}

/// How a phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseStatus {
    Passed,
    /// Passed, but at least one turn ended incomplete.
    Partial,
    Blocked,
}

impl PhaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseStatus::Passed => "passed",
            PhaseStatus::Partial => "partial",
            PhaseStatus::Blocked => "blocked",
        }
    }
}

/// Record of a finished phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseOutcome {
    pub index: usize,
    pub phase_id: String,
    pub topology: Topology,
    pub gate: Gate,
    pub turns: Vec<TurnRecord>,
    /// Output carried forward to the next phase.
    pub summary: String,
    pub gate_decision: GateDecision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negotiation: Option<NegotiationOutcome>,
    pub status: PhaseStatus,
    /// Vetoes raised during the phase, superseded rounds included.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vetoes: Vec<VetoRecord>,
}

impl PhaseOutcome {
    pub fn incomplete_turns(&self) -> usize {
        self.turns.iter().filter(|t| !t.complete).count()
    }
}

/// One run of a pattern. Mutated only by the pattern engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub pattern_id: PatternId,
    pub task: String,
    pub participants: Vec<AgentDefinition>,
    pub current_phase: usize,
    pub status: SessionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub outcomes: Vec<PhaseOutcome>,
    pub cause: Option<SessionCause>,
}

impl Session {
    pub fn new(
        pattern_id: impl Into<PatternId>,
        task: impl Into<String>,
        participants: Vec<AgentDefinition>,
    ) -> Self {
        Self {
            id: SessionId::generate(),
            pattern_id: pattern_id.into(),
            task: task.into(),
            participants,
            current_phase: 0,
            status: SessionStatus::Pending,
            started_at: None,
            ended_at: None,
            outcomes: Vec::new(),
            cause: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn participant(&self, id: &AgentId) -> Option<&AgentDefinition> {
        self.participants.iter().find(|a| &a.id == id)
    }

    pub fn start(&mut self) -> Result<(), DomainError> {
        self.transition(SessionStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn complete(&mut self) -> Result<(), DomainError> {
        self.transition(SessionStatus::Completed)?;
        self.ended_at = Some(Utc::now());
        Ok(())
    }

    pub fn block(&mut self, cause: SessionCause) -> Result<(), DomainError> {
        self.transition(SessionStatus::Blocked)?;
        self.cause = Some(cause);
        self.ended_at = Some(Utc::now());
        Ok(())
    }

    pub fn fail(&mut self, cause: SessionCause) -> Result<(), DomainError> {
        self.transition(SessionStatus::Failed)?;
        self.cause = Some(cause);
        self.ended_at = Some(Utc::now());
        Ok(())
    }

    /// Record a finished phase and move the cursor past it.
    pub fn record_phase(&mut self, outcome: PhaseOutcome) {
        self.current_phase = outcome.index + 1;
        self.outcomes.push(outcome);
    }

    /// Summary of the latest phase, if any.
    pub fn last_summary(&self) -> Option<&str> {
        self.outcomes.last().map(|o| o.summary.as_str())
    }

    /// Every veto raised in the recorded phases, oldest first.
    pub fn veto_history(&self) -> Vec<VetoRecord> {
        self.outcomes
            .iter()
            .flat_map(|o| o.vetoes.iter().cloned())
            .collect()
    }

    fn transition(&mut self, next: SessionStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(
            "review",
            "ship it",
            vec![AgentDefinition::new("a", "dev", 40)],
        )
    }

    #[test]
    fn test_happy_path() {
        let mut s = session();
        assert_eq!(s.status, SessionStatus::Pending);
        s.start().unwrap();
        assert!(s.started_at.is_some());
        s.complete().unwrap();
        assert!(s.is_terminal());
        assert!(s.ended_at.is_some());
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut s = session();
        s.start().unwrap();
        s.block(SessionCause::Invalid {
            detail: "x".to_string(),
        })
        .unwrap();
        assert!(s.start().is_err());
        assert!(s.complete().is_err());
        assert!(matches!(s.cause, Some(SessionCause::Invalid { .. })));
    }

    #[test]
    fn test_cannot_complete_without_running() {
        let mut s = session();
        let err = s.complete().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid session transition: pending -> completed"
        );
    }

    #[test]
    fn test_pending_may_fail() {
        let mut s = session();
        s.fail(SessionCause::Cancelled { phase_index: 0 }).unwrap();
        assert_eq!(s.status, SessionStatus::Failed);
    }

    #[test]
    fn test_cause_display() {
        let cause = SessionCause::GateBlocked {
            phase: "review".to_string(),
            reason: "strong veto by qa".to_string(),
            negotiation: Some(NegotiationOutcome::Escalated),
        };
        assert_eq!(
            cause.to_string(),
            "gate blocked in phase 'review': strong veto by qa (negotiation escalated)"
        );
    }
}
