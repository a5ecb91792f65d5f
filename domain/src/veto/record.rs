//! Veto records and how messages are classified into them.

use crate::agent::{AgentDefinition, VetoLevel};
use crate::core::id::{AgentId, MessageId};
use crate::message::{Message, MessageType};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// What a veto applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VetoScope {
    Session,
    Phase,
}

/// A classified veto. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VetoRecord {
    pub message_id: MessageId,
    pub agent_id: AgentId,
    pub level: VetoLevel,
    pub scope: VetoScope,
    pub reason: String,
    /// Set when a more senior approver overrode a `strong` veto.
    pub resolved: bool,
    pub raised_at: DateTime<Utc>,
}

impl VetoRecord {
    /// Whether this record blocks a `no_veto` gate.
    pub fn is_blocking(&self) -> bool {
        !self.resolved && self.level.blocks()
    }
}

/// Tunables for veto classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VetoPolicy {
    /// Repeat vetoes from one agent inside this window are downgraded to advisory.
    pub cooldown: Duration,
    /// Allow senior approvers to override `strong` vetoes.
    pub allow_override: bool,
}

impl Default for VetoPolicy {
    fn default() -> Self {
        Self {
            cooldown: Duration::seconds(60),
            allow_override: true,
        }
    }
}

/// Classify the veto messages of a phase into records.
///
/// Messages are expected in publish order. A veto only counts when its sender
/// is a participant with veto rights; the requested level is capped at the
/// sender's own level. A `strong` veto is marked resolved when a participant
/// who may approve and outranks the vetoer approves later in the list.
/// `absolute` vetoes are never resolved.
///
/// `earlier` holds the records already raised in the session. They are not
/// returned, but they start the per-agent cooldown window.
pub fn classify_vetoes(
    messages: &[Message],
    participants: &[AgentDefinition],
    policy: &VetoPolicy,
    earlier: &[VetoRecord],
) -> Vec<VetoRecord> {
    let mut records: Vec<VetoRecord> = Vec::new();

    for (idx, message) in messages.iter().enumerate() {
        if message.message_type != MessageType::Veto {
            continue;
        }
        let Some(sender) = participants.iter().find(|a| a.id == message.sender) else {
            continue;
        };
        if !sender.can_veto() {
            continue;
        }

        let mut level = message
            .payload
            .veto_level
            .map(|requested| requested.min(sender.veto_level))
            .unwrap_or(sender.veto_level);

        let in_cooldown = earlier.iter().chain(records.iter()).any(|r| {
            r.agent_id == sender.id
                && r.level != VetoLevel::Advisory
                && message.timestamp - r.raised_at < policy.cooldown
        });
        if in_cooldown && level != VetoLevel::Absolute {
            level = VetoLevel::Advisory;
        }

        let resolved = level == VetoLevel::Strong
            && policy.allow_override
            && messages[idx + 1..].iter().any(|later| {
                later.message_type == MessageType::Approve
                    && participants
                        .iter()
                        .find(|a| a.id == later.sender)
                        .is_some_and(|approver| {
                            approver.can_approve() && approver.is_senior_to(sender)
                        })
            });

        records.push(VetoRecord {
            message_id: message.id,
            agent_id: sender.id.clone(),
            level,
            scope: if message.phase_index.is_some() {
                VetoScope::Phase
            } else {
                VetoScope::Session
            },
            reason: message
                .payload
                .reason
                .clone()
                .unwrap_or_else(|| message.payload.text.clone()),
            resolved,
            raised_at: message.timestamp,
        });
    }

    records
}
