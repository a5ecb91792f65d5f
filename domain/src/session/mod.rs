//! Sessions, phase outcomes and context carried between phases.

pub mod context;
pub mod entities;

pub use context::{COMPRESSED_OUTPUT_SIZE, CONTEXT_BUDGET, compress_outputs};
pub use entities::{PhaseOutcome, PhaseStatus, Session, SessionCause, SessionStatus, TurnRecord};
