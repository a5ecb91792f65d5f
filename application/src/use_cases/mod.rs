//! Use cases
//!
//! Application-level operations that orchestrate domain logic:
//!
//! - [`provider_client`] - fallback chain over chat providers
//! - [`explore`] - bounded search loop behind `deep_search`
//! - [`execute_turn`] - one agent turn with tool calling
//! - [`negotiate`] - propose/vote rounds over a blocked gate
//! - [`run_pattern`] - the phase engine

pub mod execute_turn;
pub mod explore;
pub mod negotiate;
pub mod provider_client;
pub mod run_pattern;
