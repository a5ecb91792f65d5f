//! Agent decisions and how they map onto message types.
//!
//! Agents report a decision through the `submit_decision` tool, which carries
//! an explicit `decision` field. [`classify_markers`] recognizes the legacy
//! bracketed tags and status lines in free text; it is only consulted when no
//! structured decision was submitted, and can be disabled in configuration.

use super::entities::MessageType;
use crate::agent::VetoLevel;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// What an agent decided at the end of its turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Veto,
    Negotiate,
    Inform,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Veto => "veto",
            Decision::Negotiate => "negotiate",
            Decision::Inform => "inform",
        }
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            Decision::Approve => MessageType::Approve,
            Decision::Veto => MessageType::Veto,
            Decision::Negotiate => MessageType::Negotiate,
            Decision::Inform => MessageType::Response,
        }
    }
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "approve" | "go" => Ok(Decision::Approve),
            "veto" | "nogo" | "no-go" => Ok(Decision::Veto),
            "negotiate" => Ok(Decision::Negotiate),
            "inform" => Ok(Decision::Inform),
            other => Err(format!("unknown decision: {}", other)),
        }
    }
}

/// A decision submitted through the structured tool contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredDecision {
    pub decision: Decision,
    #[serde(default)]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub veto_level: Option<VetoLevel>,
}

/// Where a turn's decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    Structured,
    TextMarker,
    Default,
}

const VETO_MARKERS: &[&str] = &["[VETO]", "[NOGO]", "[NO-GO]", "DECISION: NOGO", "DECISION: NO-GO"];
const APPROVE_MARKERS: &[&str] = &["[APPROVE]", "[APPROVED]", "DECISION: GO"];

/// Recognize the legacy veto/approve markers in agent text.
///
/// Veto markers win over approve markers. Matching is case-insensitive.
pub fn classify_markers(text: &str) -> Option<Decision> {
    let upper = text.to_uppercase();
    if VETO_MARKERS.iter().any(|m| upper.contains(m)) {
        return Some(Decision::Veto);
    }
    if APPROVE_MARKERS.iter().any(|m| upper.contains(m)) {
        return Some(Decision::Approve);
    }
    None
}
