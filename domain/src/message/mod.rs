//! Messages exchanged on the bus and the decisions they carry.

pub mod decision;
pub mod entities;

pub use decision::{Decision, DecisionSource, StructuredDecision, classify_markers};
pub use entities::{Message, MessagePayload, MessageType};
