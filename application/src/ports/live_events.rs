//! Live event stream port
//!
//! Observers (dashboards, terminals) get a best-effort feed. Publishing must
//! never block or fail the session.

use conclave_domain::SessionId;
use serde_json::Value;

pub trait LiveEventPublisher: Send + Sync {
    fn publish_event(&self, session_id: SessionId, event_type: &str, payload: &Value);
}

pub struct NoLiveEvents;

impl LiveEventPublisher for NoLiveEvents {
    fn publish_event(&self, _session_id: SessionId, _event_type: &str, _payload: &Value) {}
}
