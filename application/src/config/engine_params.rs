//! Pattern engine and message bus parameters.

use conclave_domain::VetoPolicy;
use conclave_domain::negotiation::MAX_ROUNDS;
use conclave_domain::session::{COMPRESSED_OUTPUT_SIZE, CONTEXT_BUDGET};

/// Session-level behavior of the pattern engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineParams {
    /// Extra attempts for a turn that ended incomplete.
    pub turn_retry_budget: usize,
    /// Run a negotiation when a gate blocks.
    pub negotiate_on_block: bool,
    pub negotiation_rounds: usize,
    /// Fall back to text markers when an agent submits no structured decision.
    pub marker_fallback: bool,
    /// Budget for prior-phase context carried forward.
    pub context_budget: usize,
    pub compressed_output_size: usize,
    pub veto_policy: VetoPolicy,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            turn_retry_budget: 1,
            negotiate_on_block: true,
            negotiation_rounds: MAX_ROUNDS,
            marker_fallback: true,
            context_budget: CONTEXT_BUDGET,
            compressed_output_size: COMPRESSED_OUTPUT_SIZE,
            veto_policy: VetoPolicy::default(),
        }
    }
}

impl EngineParams {
    pub fn with_turn_retry_budget(mut self, budget: usize) -> Self {
        self.turn_retry_budget = budget;
        self
    }

    pub fn with_negotiation(mut self, enabled: bool, rounds: usize) -> Self {
        self.negotiate_on_block = enabled;
        self.negotiation_rounds = rounds.clamp(1, MAX_ROUNDS);
        self
    }

    pub fn with_marker_fallback(mut self, enabled: bool) -> Self {
        self.marker_fallback = enabled;
        self
    }
}

/// Capacities of the message bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// Pending messages per session listener before dead-lettering.
    pub session_capacity: usize,
    /// Dead letters kept (newest win).
    pub dead_letter_cap: usize,
    /// Buffer of the global broadcast; slow observers skip ahead.
    pub global_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            session_capacity: 2_000,
            dead_letter_cap: 1_000,
            global_capacity: 256,
        }
    }
}
