//! Veto classification and gate evaluation.
//!
//! Gates are evaluated on the messages published during a phase. The
//! classification step turns `veto`-typed messages into [`VetoRecord`]s,
//! applying the sender's rights, the per-agent cooldown and senior overrides.

pub mod gate;
pub mod record;

pub use gate::{BlockReason, GateDecision, evaluate_gate};
pub use record::{VetoPolicy, VetoRecord, VetoScope, classify_vetoes};
