//! Bounded exploration: sub-queries, findings and loop state.

pub mod query;
pub mod state;

pub use query::{
    ExplorationDecision, SubQuery, SubQueryTool, auto_pattern, parse_exploration_decision,
};
pub use state::{
    DEFAULT_FINDINGS_CAP, MAX_ITERATIONS, MAX_QUERIES, ExplorationState, Findings,
    FindingsBuffer, TerminationReason, format_finding,
};
