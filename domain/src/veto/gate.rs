//! Gate evaluation at the end of a phase.

use super::record::{VetoPolicy, VetoRecord, classify_vetoes};
use crate::agent::{AgentDefinition, VetoLevel};
use crate::core::id::AgentId;
use crate::message::{Message, MessageType};
use crate::pattern::Gate;
use serde::{Deserialize, Serialize};

/// Why a gate did not pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockReason {
    /// A blocking veto was raised.
    Veto { record: VetoRecord },
    /// Participants with veto rights stayed silent past the turn budget.
    MissingApprovals { missing: Vec<AgentId> },
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockReason::Veto { record } => write!(
                f,
                "{} veto by {}: {}",
                record.level, record.agent_id, record.reason
            ),
            BlockReason::MissingApprovals { missing } => {
                let ids: Vec<_> = missing.iter().map(|id| id.as_str()).collect();
                write!(f, "no approval from {}", ids.join(", "))
            }
        }
    }
}

/// Result of evaluating a gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateDecision {
    Pass,
    Blocked { reason: BlockReason },
}

impl GateDecision {
    pub fn is_pass(&self) -> bool {
        matches!(self, GateDecision::Pass)
    }

    pub fn blocked(reason: BlockReason) -> Self {
        GateDecision::Blocked { reason }
    }
}

/// Evaluate `gate` against the messages published during a phase.
///
/// - `always` passes.
/// - `no_veto` blocks on any unresolved `strong` veto and on every `absolute`
///   veto. Advisory vetoes never block.
/// - `all_approved` applies the `no_veto` rule, then requires that every
///   participant with veto rights has an approve as its latest verdict.
///
/// `earlier` are the veto records raised before these messages in the same
/// session; see [`classify_vetoes`].
pub fn evaluate_gate(
    gate: Gate,
    messages: &[Message],
    participants: &[AgentDefinition],
    policy: &VetoPolicy,
    earlier: &[VetoRecord],
) -> GateDecision {
    if gate == Gate::Always {
        return GateDecision::Pass;
    }

    let records = classify_vetoes(messages, participants, policy, earlier);
    if let Some(blocking) = first_blocking(&records) {
        return GateDecision::blocked(BlockReason::Veto {
            record: blocking.clone(),
        });
    }

    if gate == Gate::AllApproved {
        let missing: Vec<AgentId> = participants
            .iter()
            .filter(|a| a.can_veto())
            .filter(|a| latest_verdict(messages, &a.id) != Some(MessageType::Approve))
            .map(|a| a.id.clone())
            .collect();
        if !missing.is_empty() {
            return GateDecision::blocked(BlockReason::MissingApprovals { missing });
        }
    }

    GateDecision::Pass
}

/// Absolute vetoes take precedence over strong ones.
fn first_blocking(records: &[VetoRecord]) -> Option<&VetoRecord> {
    records
        .iter()
        .find(|r| r.level == VetoLevel::Absolute)
        .or_else(|| records.iter().find(|r| r.is_blocking()))
}

fn latest_verdict(messages: &[Message], agent: &AgentId) -> Option<MessageType> {
    messages
        .iter()
        .rev()
        .filter(|m| &m.sender == agent)
        .map(|m| m.message_type)
        .find(|t| matches!(t, MessageType::Approve | MessageType::Veto))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::id::SessionId;
    use crate::message::MessagePayload;

    fn msg(session: SessionId, sender: &str, kind: MessageType) -> Message {
        Message::new(session, sender, kind, MessagePayload::text(kind.as_str())).with_phase(0)
    }

    fn panel() -> Vec<AgentDefinition> {
        vec![
            AgentDefinition::new("lead", "lead", 10).with_veto_level(VetoLevel::Strong),
            AgentDefinition::new("sec", "security", 30).with_veto_level(VetoLevel::Absolute),
            AgentDefinition::new("qa", "qa", 50).with_veto_level(VetoLevel::Advisory),
            AgentDefinition::new("dev", "developer", 40),
        ]
    }

    #[test]
    fn test_always_passes_even_with_veto() {
        let s = SessionId::generate();
        let decision = evaluate_gate(
            Gate::Always,
            &[msg(s, "sec", MessageType::Veto)],
            &panel(),
            &VetoPolicy::default(),
            &[],
        );
        assert!(decision.is_pass());
    }

    #[test]
    fn test_absolute_veto_blocks_regardless_of_approvals() {
        let s = SessionId::generate();
        let mut messages = vec![msg(s, "sec", MessageType::Veto)];
        for _ in 0..5 {
            messages.push(msg(s, "lead", MessageType::Approve));
        }
        messages.push(msg(s, "sec", MessageType::Approve));

        for gate in [Gate::NoVeto, Gate::AllApproved] {
            let decision = evaluate_gate(gate, &messages, &panel(), &VetoPolicy::default(), &[]);
            match decision {
                GateDecision::Blocked {
                    reason: BlockReason::Veto { record },
                } => assert_eq!(record.level, VetoLevel::Absolute),
                other => panic!("expected absolute veto block, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_advisory_veto_never_blocks() {
        let s = SessionId::generate();
        let decision = evaluate_gate(
            Gate::NoVeto,
            &[msg(s, "qa", MessageType::Veto)],
            &panel(),
            &VetoPolicy::default(),
            &[],
        );
        assert!(decision.is_pass());
    }

    #[test]
    fn test_strong_veto_blocks_without_senior_override() {
        let s = SessionId::generate();
        let agents = vec![
            AgentDefinition::new("arch", "architect", 20).with_veto_level(VetoLevel::Strong),
            AgentDefinition::new("dev", "developer", 40),
        ];
        let decision = evaluate_gate(
            Gate::NoVeto,
            &[
                msg(s, "arch", MessageType::Veto),
                msg(s, "dev", MessageType::Approve),
            ],
            &agents,
            &VetoPolicy::default(),
            &[],
        );
        assert!(!decision.is_pass());
    }

    #[test]
    fn test_all_approved_requires_every_veto_holder() {
        let s = SessionId::generate();
        let messages = vec![
            msg(s, "lead", MessageType::Approve),
            msg(s, "sec", MessageType::Approve),
        ];
        let decision = evaluate_gate(
            Gate::AllApproved,
            &messages,
            &panel(),
            &VetoPolicy::default(),
            &[],
        );
        match decision {
            GateDecision::Blocked {
                reason: BlockReason::MissingApprovals { missing },
            } => assert_eq!(missing, vec![AgentId::from("qa")]),
            other => panic!("expected missing approvals, got {:?}", other),
        }
    }

    #[test]
    fn test_all_approved_latest_verdict_counts() {
        let s = SessionId::generate();
        let agents =
            vec![AgentDefinition::new("qa", "qa", 50).with_veto_level(VetoLevel::Advisory)];
        let messages = vec![
            msg(s, "qa", MessageType::Veto),
            msg(s, "qa", MessageType::Inform),
            msg(s, "qa", MessageType::Approve),
        ];
        let decision = evaluate_gate(
            Gate::AllApproved,
            &messages,
            &agents,
            &VetoPolicy::default(),
            &[],
        );
        assert!(decision.is_pass());
    }

    #[test]
    fn test_repeat_veto_after_earlier_phase_does_not_block() {
        let s = SessionId::generate();
        let agents = vec![AgentDefinition::new("qa", "qa", 50).with_veto_level(VetoLevel::Strong)];
        let first = vec![msg(s, "qa", MessageType::Veto)];
        let earlier = classify_vetoes(&first, &agents, &VetoPolicy::default(), &[]);

        let second = vec![msg(s, "qa", MessageType::Veto)];
        let decision = evaluate_gate(
            Gate::NoVeto,
            &second,
            &agents,
            &VetoPolicy::default(),
            &earlier,
        );
        assert!(decision.is_pass());
        let fresh = evaluate_gate(Gate::NoVeto, &second, &agents, &VetoPolicy::default(), &[]);
        assert!(!fresh.is_pass());
    }

    #[test]
    fn test_block_reason_display() {
        let reason = BlockReason::MissingApprovals {
            missing: vec!["a".into(), "b".into()],
        };
        assert_eq!(reason.to_string(), "no approval from a, b");
    }
}
