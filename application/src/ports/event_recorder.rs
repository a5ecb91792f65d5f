//! Port for the append-only session event log.
//!
//! The engine writes every phase transition, message and gate decision here
//! for audit and replay. It never reads its own history back during a run;
//! in-memory session state stays authoritative.
//!
//! This is separate from `tracing`: tracing carries diagnostics for humans,
//! the recorder carries a machine-readable transcript.

use chrono::{DateTime, Utc};
use conclave_domain::SessionId;
use serde_json::Value;

/// Event type names used by the engine.
pub mod event_types {
    pub const SESSION_STARTED: &str = "session_started";
    pub const PHASE_STARTED: &str = "phase_started";
    pub const MESSAGE: &str = "message";
    pub const GATE_DECISION: &str = "gate_decision";
    pub const NEGOTIATION: &str = "negotiation";
    pub const PHASE_COMPLETED: &str = "phase_completed";
    pub const SESSION_FINISHED: &str = "session_finished";
}

/// A structured session event.
#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub event_type: &'static str,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

impl SessionEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
            timestamp: Utc::now(),
        }
    }
}

/// Sink for session events.
///
/// `record_event` is synchronous and non-fallible so a failing sink never
/// disrupts a session; implementations log their own errors.
pub trait EventRecorder: Send + Sync {
    fn record_event(&self, session_id: SessionId, event: SessionEvent);
}

/// No-op recorder for tests and when persistence is disabled.
pub struct NoEventRecorder;

impl EventRecorder for NoEventRecorder {
    fn record_event(&self, _session_id: SessionId, _event: SessionEvent) {}
}
