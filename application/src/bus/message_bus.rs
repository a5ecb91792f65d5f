//! Message bus: per-session priority delivery plus a global broadcast.

use super::queue::ListenerQueue;
use crate::config::BusConfig;
use chrono::{DateTime, Utc};
use conclave_domain::{Message, SessionId};
use futures::stream::{self, Stream, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

/// A message that could not be delivered to a session listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    pub message: Message,
    pub at: DateTime<Utc>,
}

/// Counters since the bus was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    pub published: u64,
    /// Enqueued into session listener queues (one per listener).
    pub delivered: u64,
    pub dead_lettered: u64,
    /// Sessions with at least one live listener.
    pub active_sessions: usize,
}

#[derive(Default)]
struct BusState {
    sessions: HashMap<SessionId, Vec<Weak<ListenerQueue>>>,
    dead_letters: VecDeque<DeadLetter>,
    sequence: u64,
}

impl BusState {
    fn live_listeners(&mut self, session: &SessionId) -> Vec<Arc<ListenerQueue>> {
        let Some(listeners) = self.sessions.get_mut(session) else {
            return Vec::new();
        };
        listeners.retain(|w| w.strong_count() > 0);
        let live: Vec<_> = listeners.iter().filter_map(Weak::upgrade).collect();
        if live.is_empty() {
            self.sessions.remove(session);
        }
        live
    }
}

/// Asynchronous message bus shared by all sessions.
pub struct MessageBus {
    config: BusConfig,
    state: Mutex<BusState>,
    global: broadcast::Sender<Message>,
    published: AtomicU64,
    delivered: AtomicU64,
    dead_lettered: AtomicU64,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

impl MessageBus {
    pub fn new(config: BusConfig) -> Self {
        let (global, _) = broadcast::channel(config.global_capacity.max(1));
        Self {
            config,
            state: Mutex::new(BusState::default()),
            global,
            published: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            dead_lettered: AtomicU64::new(0),
        }
    }

    /// Publish a message to its session's listeners and to global observers.
    ///
    /// Never blocks and never fails: a full listener queue moves the message
    /// to the dead-letter log. Returns the message with its sequence assigned.
    pub fn publish(&self, mut message: Message) -> Message {
        let mut state = self.lock();
        state.sequence += 1;
        message.sequence = state.sequence;

        for listener in state.live_listeners(&message.session_id) {
            match listener.push(message.clone()) {
                Ok(()) => {
                    self.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(rejected) => {
                    warn!(
                        "Session {} queue full, dead-lettering {} message {}",
                        rejected.session_id, rejected.message_type, rejected.id
                    );
                    self.dead_lettered.fetch_add(1, Ordering::Relaxed);
                    if state.dead_letters.len() >= self.config.dead_letter_cap {
                        state.dead_letters.pop_front();
                    }
                    state.dead_letters.push_back(DeadLetter {
                        message: rejected,
                        at: Utc::now(),
                    });
                }
            }
        }

        // No global observers is fine.
        let _ = self.global.send(message.clone());
        self.published.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Published {} #{} from {} in session {}",
            message.message_type, message.sequence, message.sender, message.session_id
        );
        message
    }

    /// Listen to one session. Each subscription has its own queue.
    pub fn subscribe(&self, session: SessionId) -> SessionSubscription {
        let queue = Arc::new(ListenerQueue::new(self.config.session_capacity));
        self.lock()
            .sessions
            .entry(session)
            .or_default()
            .push(Arc::downgrade(&queue));
        SessionSubscription { session, queue }
    }

    /// Observe every message on the bus. Lagging observers skip ahead.
    pub fn subscribe_global(&self) -> impl Stream<Item = Message> + Send + 'static {
        BroadcastStream::new(self.global.subscribe())
            .filter_map(|result| async move { result.ok() })
    }

    /// End all subscriptions of a session. Pending messages stay readable.
    pub fn close_session(&self, session: &SessionId) {
        let listeners = self.lock().sessions.remove(session).unwrap_or_default();
        for listener in listeners.iter().filter_map(Weak::upgrade) {
            listener.close();
        }
        debug!("Closed session {} on the bus", session);
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.lock().dead_letters.iter().cloned().collect()
    }

    pub fn stats(&self) -> BusStats {
        let active_sessions = {
            let state = self.lock();
            state
                .sessions
                .values()
                .filter(|ls| ls.iter().any(|w| w.strong_count() > 0))
                .count()
        };
        BusStats {
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            active_sessions,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Receiving end of [`MessageBus::subscribe`]. Dropping it unsubscribes.
pub struct SessionSubscription {
    session: SessionId,
    queue: Arc<ListenerQueue>,
}

impl SessionSubscription {
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Wait for the next message; `None` once the session is closed and
    /// the queue drained.
    pub async fn recv(&mut self) -> Option<Message> {
        self.queue.recv().await
    }

    /// Next message if one is already queued.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.queue.pop()
    }

    /// Drain everything currently queued, in delivery order.
    pub fn drain(&mut self) -> Vec<Message> {
        std::iter::from_fn(|| self.queue.pop()).collect()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn into_stream(self) -> impl Stream<Item = Message> + Send + 'static {
        stream::unfold(self.queue, |queue| async move {
            let message = queue.recv().await?;
            Some((message, queue))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_domain::{MessagePayload, MessageType};

    fn msg(session: SessionId, kind: MessageType, text: &str) -> Message {
        Message::new(session, "agent", kind, MessagePayload::text(text))
    }

    #[tokio::test]
    async fn test_veto_overtakes_earlier_inform() {
        let bus = MessageBus::default();
        let session = SessionId::generate();
        let mut sub = bus.subscribe(session);

        bus.publish(msg(session, MessageType::Inform, "fyi"));
        bus.publish(msg(session, MessageType::Response, "answer"));
        bus.publish(msg(session, MessageType::Veto, "stop"));

        let texts: Vec<String> = sub.drain().iter().map(|m| m.text().to_string()).collect();
        assert_eq!(texts, vec!["stop", "answer", "fyi"]);
    }

    #[tokio::test]
    async fn test_sequence_is_assigned_in_publish_order() {
        let bus = MessageBus::default();
        let session = SessionId::generate();
        let first = bus.publish(msg(session, MessageType::Request, "a"));
        let second = bus.publish(msg(session, MessageType::Request, "b"));
        assert!(second.sequence > first.sequence);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated_but_global_sees_all() {
        let bus = MessageBus::default();
        let (s1, s2) = (SessionId::generate(), SessionId::generate());
        let mut sub1 = bus.subscribe(s1);
        let global = bus.subscribe_global();
        tokio::pin!(global);

        bus.publish(msg(s1, MessageType::Request, "one"));
        bus.publish(msg(s2, MessageType::Request, "two"));

        assert_eq!(sub1.drain().len(), 1);
        assert_eq!(global.next().await.unwrap().text(), "one");
        assert_eq!(global.next().await.unwrap().text(), "two");
    }

    #[tokio::test]
    async fn test_overflow_goes_to_dead_letters() {
        let bus = MessageBus::new(BusConfig {
            session_capacity: 2,
            dead_letter_cap: 2,
            global_capacity: 16,
        });
        let session = SessionId::generate();
        let mut sub = bus.subscribe(session);

        for i in 0..5 {
            bus.publish(msg(session, MessageType::Inform, &format!("m{}", i)));
        }

        assert_eq!(sub.drain().len(), 2);
        let dead: Vec<String> = bus
            .dead_letters()
            .iter()
            .map(|d| d.message.text().to_string())
            .collect();
        assert_eq!(dead, vec!["m3", "m4"]);

        let stats = bus.stats();
        assert_eq!(stats.published, 5);
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.dead_lettered, 3);
    }

    #[tokio::test]
    async fn test_close_session_ends_stream() {
        let bus = Arc::new(MessageBus::default());
        let session = SessionId::generate();
        let stream = bus.subscribe(session).into_stream();

        let reader = tokio::spawn(async move { stream.collect::<Vec<_>>().await });
        bus.publish(msg(session, MessageType::Approve, "ok"));
        bus.close_session(&session);

        let received = reader.await.unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(bus.stats().active_sessions, 0);
    }

    #[tokio::test]
    async fn test_dropped_subscription_stops_delivery() {
        let bus = MessageBus::default();
        let session = SessionId::generate();
        let sub = bus.subscribe(session);
        assert_eq!(bus.stats().active_sessions, 1);
        drop(sub);

        bus.publish(msg(session, MessageType::Request, "nobody"));
        assert_eq!(bus.stats().delivered, 0);
        assert_eq!(bus.stats().active_sessions, 0);
    }
}
