//! Exploration backend adapters
//!
//! - [`LocalExplorationBackend`]: grep, read and structure sub-agents over
//!   the local workspace

mod local_backend;

pub use local_backend::LocalExplorationBackend;
