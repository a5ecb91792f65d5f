//! Domain layer for conclave
//!
//! Pure types and rules for multi-agent orchestration. No I/O, no async:
//! everything here can be exercised with plain unit tests.
//!
//! # Core Concepts
//!
//! - **Session**: one run of a [`PatternDef`] over a set of [`AgentDefinition`]s
//! - **Phase**: one step of a pattern, with a [`Topology`] and a [`Gate`]
//! - **Gate**: pass/fail rule at the end of a phase, see [`evaluate_gate`]
//! - **Negotiation**: propose, counter and vote when a gate blocks
//! - **Findings**: size-capped output of the exploration loop
//! - **Cooldown**: window during which a rate-limited provider is skipped

pub mod agent;
pub mod core;
pub mod exploration;
pub mod message;
pub mod negotiation;
pub mod pattern;
pub mod prompt;
pub mod provider;
pub mod session;
pub mod tool;
pub mod veto;

pub use agent::{AgentDefinition, VetoLevel};
pub use core::{
    error::DomainError,
    id::{AgentId, MessageId, PatternId, ProviderId, SessionId},
};
pub use exploration::{
    ExplorationDecision, ExplorationState, Findings, FindingsBuffer, SubQuery, SubQueryTool,
    TerminationReason,
};
pub use message::{
    Decision, DecisionSource, Message, MessagePayload, MessageType, StructuredDecision,
};
pub use negotiation::{Ballot, Negotiation, NegotiationOutcome, NegotiationRound};
pub use pattern::{Gate, ParticipantSelection, PatternDef, Phase, Topology, TopologyOptions};
pub use provider::{
    Availability, ChatMessage, ChatRequest, ChatResponse, ChatRole, CircuitPolicy, CooldownPolicy,
    CooldownTable, ProviderConfig, ProviderLimits, TokenUsage,
};
pub use session::{PhaseOutcome, PhaseStatus, Session, SessionCause, SessionStatus, TurnRecord};
pub use tool::{ToolCall, ToolDefinition, ToolError, ToolParameter, ToolResult, ToolSpec};
pub use veto::{
    BlockReason, GateDecision, VetoPolicy, VetoRecord, VetoScope, classify_vetoes, evaluate_gate,
};
