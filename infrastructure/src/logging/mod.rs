//! Logging infrastructure: the append-only session event log.
//!
//! Provides [`JsonlEventRecorder`], a JSONL writer that implements the
//! [`EventRecorder`](conclave_application::EventRecorder) port.

mod jsonl_recorder;

pub use jsonl_recorder::JsonlEventRecorder;
