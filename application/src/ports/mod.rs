//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod agent_registry;
pub mod chat_provider;
pub mod event_recorder;
pub mod exploration_backend;
pub mod live_events;
pub mod memory_search;
pub mod tool_executor;
