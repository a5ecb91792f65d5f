//! Application-level configuration.
//!
//! - [`ExecutorParams`] - tool-calling loop control
//! - [`ExplorationParams`] - exploration sub-loop bounds
//! - [`EngineParams`] - retries, negotiation and decision handling
//! - [`BusConfig`] - message bus capacities

pub mod engine_params;
pub mod executor_params;

pub use engine_params::{BusConfig, EngineParams};
pub use executor_params::{ExecutorParams, ExplorationParams};
