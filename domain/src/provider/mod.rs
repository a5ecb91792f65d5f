//! Provider-neutral chat types, chain configuration and cooldown state.

pub mod chat;
pub mod config;
pub mod cooldown;

pub use chat::{
    ChatMessage, ChatRequest, ChatResponse, ChatRole, TokenUsage, strip_think_blocks,
};
pub use config::{CircuitPolicy, CooldownPolicy, ProviderConfig, ProviderLimits};
pub use cooldown::{Availability, CooldownTable};
