//! Agent definitions and their derived permissions.

pub mod definition;

pub use definition::{AgentDefinition, VetoLevel};
