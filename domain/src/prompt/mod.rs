//! Prompt domain
//!
//! Templates for agent turns, exploration orchestration and negotiation.

pub mod agent;
pub mod exploration;
pub mod negotiation;

pub use agent::{AgentPromptTemplate, parse_subtasks};
pub use exploration::ExplorationPromptTemplate;
pub use negotiation::NegotiationPromptTemplate;
