//! JSONL file writer for session events.
//!
//! Each session gets its own `<session-id>.events.jsonl` file in the events
//! directory. Every [`SessionEvent`] becomes one JSON line carrying `type`,
//! `timestamp` and `session_id` next to the payload fields.

use conclave_application::ports::event_recorder::{EventRecorder, SessionEvent, event_types};
use conclave_domain::SessionId;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Event recorder writing one JSONL file per session.
///
/// Thread-safe via a mutex over the open writers. A session's file is
/// flushed and closed when its `session_finished` event is written; the
/// rest are flushed on `Drop`.
pub struct JsonlEventRecorder {
    dir: PathBuf,
    writers: Mutex<HashMap<SessionId, BufWriter<File>>>,
}

impl JsonlEventRecorder {
    /// Create a recorder writing under `dir`, creating it if needed.
    pub fn new(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            writers: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the log file for `session_id`.
    pub fn path_for(&self, session_id: SessionId) -> PathBuf {
        self.dir.join(format!("{}.events.jsonl", session_id))
    }

    fn open(&self, session_id: SessionId) -> Option<BufWriter<File>> {
        let path = self.path_for(session_id);
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => Some(BufWriter::new(file)),
            Err(e) => {
                warn!("Could not open event log {}: {}", path.display(), e);
                None
            }
        }
    }
}

fn record(session_id: SessionId, event: SessionEvent) -> Value {
    let mut map = match event.payload {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("data".to_string(), other);
            map
        }
    };
    map.insert("type".to_string(), Value::String(event.event_type.to_string()));
    map.insert(
        "timestamp".to_string(),
        Value::String(
            event
                .timestamp
                .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        ),
    );
    map.insert("session_id".to_string(), Value::String(session_id.to_string()));
    Value::Object(map)
}

impl EventRecorder for JsonlEventRecorder {
    fn record_event(&self, session_id: SessionId, event: SessionEvent) {
        let finished = event.event_type == event_types::SESSION_FINISHED;
        let Ok(line) = serde_json::to_string(&record(session_id, event)) else {
            return;
        };

        let mut writers = self.writers.lock().unwrap_or_else(|p| p.into_inner());
        if !writers.contains_key(&session_id) {
            let Some(writer) = self.open(session_id) else {
                return;
            };
            writers.insert(session_id, writer);
        }
        let Some(writer) = writers.get_mut(&session_id) else {
            return;
        };

        // Flushed per line: the log must survive a crash mid-session.
        if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
            warn!("Could not write event log for session {}: {}", session_id, e);
        }
        if finished {
            writers.remove(&session_id);
        }
    }
}

impl Drop for JsonlEventRecorder {
    fn drop(&mut self) {
        let writers = self.writers.get_mut().unwrap_or_else(|p| p.into_inner());
        for writer in writers.values_mut() {
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lines(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_writes_one_file_per_session() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = JsonlEventRecorder::new(dir.path().join("events")).unwrap();
        let a = SessionId::generate();
        let b = SessionId::generate();

        recorder.record_event(
            a,
            SessionEvent::new(event_types::SESSION_STARTED, json!({"pattern": "review"})),
        );
        recorder.record_event(
            b,
            SessionEvent::new(event_types::PHASE_STARTED, json!({"phase": "x"})),
        );
        recorder.record_event(
            a,
            SessionEvent::new(event_types::SESSION_FINISHED, json!({"status": "completed"})),
        );

        let first = lines(&recorder.path_for(a));
        assert_eq!(first.len(), 2);
        assert_eq!(first[0]["type"], "session_started");
        assert_eq!(first[0]["pattern"], "review");
        assert_eq!(first[0]["session_id"], a.to_string());
        assert!(first[0].get("timestamp").is_some());
        assert_eq!(first[1]["status"], "completed");

        assert_eq!(lines(&recorder.path_for(b)).len(), 1);
        // finished sessions release their writer
        assert_eq!(recorder.writers.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_non_object_payload() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = JsonlEventRecorder::new(dir.path()).unwrap();
        let id = SessionId::generate();

        recorder.record_event(id, SessionEvent::new(event_types::MESSAGE, json!("just a string")));
        drop(recorder);

        let path = dir.path().join(format!("{}.events.jsonl", id));
        let value = &lines(&path)[0];
        assert_eq!(value["type"], "message");
        assert_eq!(value["data"], "just a string");
    }
}
