//! Inter-agent messages.

use crate::agent::VetoLevel;
use crate::core::id::{AgentId, MessageId, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of an inter-agent message. Determines delivery priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Request,
    Response,
    Delegate,
    Veto,
    Approve,
    Inform,
    Negotiate,
    Escalate,
}

impl MessageType {
    /// Delivery priority; higher is dequeued first within a session.
    pub fn priority(&self) -> u8 {
        match self {
            MessageType::Veto => 10,
            MessageType::Escalate => 9,
            MessageType::Delegate => 7,
            MessageType::Approve => 6,
            MessageType::Request => 5,
            MessageType::Negotiate => 5,
            MessageType::Response => 4,
            MessageType::Inform => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Request => "request",
            MessageType::Response => "response",
            MessageType::Delegate => "delegate",
            MessageType::Veto => "veto",
            MessageType::Approve => "approve",
            MessageType::Inform => "inform",
            MessageType::Negotiate => "negotiate",
            MessageType::Escalate => "escalate",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message body.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessagePayload {
    pub text: String,
    /// Requested severity for veto messages. Capped by the sender's own level
    /// during classification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub veto_level: Option<VetoLevel>,
    /// Reason attached to a structured decision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl MessagePayload {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// A message exchanged between agents within one session.
///
/// Immutable once published. `sequence` is assigned by the bus at publish
/// time and breaks priority ties in FIFO order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub session_id: SessionId,
    pub sender: AgentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<AgentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_index: Option<usize>,
    pub message_type: MessageType,
    pub payload: MessagePayload,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub sequence: u64,
}

impl Message {
    pub fn new(
        session_id: SessionId,
        sender: impl Into<AgentId>,
        message_type: MessageType,
        payload: MessagePayload,
    ) -> Self {
        Self {
            id: MessageId::generate(),
            session_id,
            sender: sender.into(),
            recipient: None,
            phase_index: None,
            message_type,
            payload,
            timestamp: Utc::now(),
            sequence: 0,
        }
    }

    pub fn with_recipient(mut self, recipient: impl Into<AgentId>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    pub fn with_phase(mut self, phase_index: usize) -> Self {
        self.phase_index = Some(phase_index);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn priority(&self) -> u8 {
        self.message_type.priority()
    }

    pub fn text(&self) -> &str {
        &self.payload.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert_eq!(MessageType::Veto.priority(), 10);
        assert_eq!(MessageType::Request.priority(), 5);
        assert_eq!(MessageType::Inform.priority(), 1);
        assert!(MessageType::Approve.priority() > MessageType::Request.priority());
        assert!(MessageType::Approve.priority() > MessageType::Inform.priority());
    }

    #[test]
    fn test_message_builder() {
        let session = SessionId::generate();
        let msg = Message::new(
            session,
            "qa",
            MessageType::Veto,
            MessagePayload::text("tests are red"),
        )
        .with_phase(2);

        assert_eq!(msg.session_id, session);
        assert_eq!(msg.sender.as_str(), "qa");
        assert_eq!(msg.phase_index, Some(2));
        assert_eq!(msg.priority(), 10);
        assert_eq!(msg.text(), "tests are red");
    }

    #[test]
    fn test_message_type_serde() {
        let json = serde_json::to_string(&MessageType::Negotiate).unwrap();
        assert_eq!(json, "\"negotiate\"");
    }
}
