//! Negotiation over a blocked gate.

pub mod process;
pub mod round;

pub use process::Negotiation;
pub use round::{Ballot, MAX_ROUNDS, NegotiationOutcome, NegotiationRound, RoundVerdict};
