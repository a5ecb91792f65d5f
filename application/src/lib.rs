//! Application layer for conclave
//!
//! This crate contains use cases, port definitions, the message bus and
//! application configuration. It depends only on the domain layer.

pub mod bus;
pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use bus::{BusStats, DeadLetter, MessageBus, SessionSubscription};
pub use config::{BusConfig, EngineParams, ExecutorParams, ExplorationParams};
pub use ports::{
    agent_registry::{AgentRegistry, RegistryError},
    chat_provider::{ChatProvider, ProviderError},
    event_recorder::{EventRecorder, NoEventRecorder, SessionEvent, event_types},
    exploration_backend::ExplorationBackend,
    live_events::{LiveEventPublisher, NoLiveEvents},
    memory_search::{MemoryError, MemorySearch, NoMemory},
    tool_executor::{NoTools, ToolExecutorPort},
};
pub use use_cases::execute_turn::{TurnContext, TurnError, TurnExecutor, TurnOutput, TurnRunner};
pub use use_cases::explore::Explorer;
pub use use_cases::negotiate::{LlmNegotiator, NegotiationRunner, Negotiator, parse_ballot};
pub use use_cases::provider_client::{
    AttemptOutcome, ChatError, ProviderAttempt, ProviderClient, SharedCooldownTable,
};
pub use use_cases::run_pattern::{
    CustomPhaseHandler, PatternEngine, PhaseError, PhaseRequest, PhaseRun, RunPatternError,
    TurnDriver, TurnOutcome,
};
