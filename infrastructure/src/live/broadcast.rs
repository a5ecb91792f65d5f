//! Best-effort live feed over a tokio broadcast channel.
//!
//! Publishing never blocks: with no subscriber the event is dropped, and a
//! subscriber that falls behind skips the events it missed.

use chrono::{DateTime, Utc};
use conclave_application::ports::live_events::LiveEventPublisher;
use conclave_domain::SessionId;
use futures::stream::{Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::trace;

/// One event as seen by a live observer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveEvent {
    pub session_id: SessionId,
    pub event_type: String,
    pub payload: Value,
    pub at: DateTime<Utc>,
}

pub struct BroadcastLiveEvents {
    sender: broadcast::Sender<LiveEvent>,
}

impl BroadcastLiveEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Every event of every session, from now on.
    pub fn subscribe(&self) -> impl Stream<Item = LiveEvent> + Send + 'static {
        BroadcastStream::new(self.sender.subscribe())
            .filter_map(|result| async move { result.ok() })
    }

    /// Events of one session only.
    pub fn subscribe_session(
        &self,
        session_id: SessionId,
    ) -> impl Stream<Item = LiveEvent> + Send + 'static {
        self.subscribe()
            .filter(move |event| futures::future::ready(event.session_id == session_id))
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastLiveEvents {
    fn default() -> Self {
        Self::new(256)
    }
}

impl LiveEventPublisher for BroadcastLiveEvents {
    fn publish_event(&self, session_id: SessionId, event_type: &str, payload: &Value) {
        let event = LiveEvent {
            session_id,
            event_type: event_type.to_string(),
            payload: payload.clone(),
            at: Utc::now(),
        };
        if self.sender.send(event).is_err() {
            trace!("No live observers for {}", event_type);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_session_filter() {
        let live = BroadcastLiveEvents::new(16);
        let a = SessionId::generate();
        let b = SessionId::generate();
        let mut only_a = Box::pin(live.subscribe_session(a));
        let mut all = Box::pin(live.subscribe());

        live.publish_event(b, "phase_started", &json!({"phase": "x"}));
        live.publish_event(a, "message", &json!({"text": "hi"}));

        let event = only_a.next().await.unwrap();
        assert_eq!(event.session_id, a);
        assert_eq!(event.payload["text"], "hi");

        assert_eq!(all.next().await.unwrap().session_id, b);
        assert_eq!(all.next().await.unwrap().session_id, a);
    }

    #[tokio::test]
    async fn test_publish_without_observers_is_fine() {
        let live = BroadcastLiveEvents::default();
        assert_eq!(live.subscriber_count(), 0);
        live.publish_event(SessionId::generate(), "message", &Value::Null);
    }

    #[tokio::test]
    async fn test_lagging_observer_skips_ahead() {
        let live = BroadcastLiveEvents::new(2);
        let id = SessionId::generate();
        let mut stream = Box::pin(live.subscribe());
        for i in 0..5 {
            live.publish_event(id, "message", &json!({ "n": i }));
        }
        // the lag error is swallowed; the newest events remain
        assert_eq!(stream.next().await.unwrap().payload["n"], 3);
        assert_eq!(stream.next().await.unwrap().payload["n"], 4);
    }
}
