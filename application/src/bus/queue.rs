//! Priority queue backing one session listener.

use conclave_domain::Message;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use tokio::sync::Notify;

/// Heap entry: higher priority first, then lower sequence first.
#[derive(Debug)]
struct Queued(Message);

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .priority()
            .cmp(&other.0.priority())
            .then_with(|| other.0.sequence.cmp(&self.0.sequence))
    }
}

/// Bounded priority queue with a wake-up signal.
#[derive(Debug)]
pub struct ListenerQueue {
    heap: Mutex<BinaryHeap<Queued>>,
    notify: Notify,
    closed: AtomicBool,
    capacity: usize,
}

impl ListenerQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            capacity,
        }
    }

    /// Enqueue a message. Returns it back when the queue is full or closed.
    pub fn push(&self, message: Message) -> Result<(), Message> {
        if self.is_closed() {
            return Err(message);
        }
        {
            let mut heap = self.heap.lock().unwrap_or_else(|p| p.into_inner());
            if heap.len() >= self.capacity {
                return Err(message);
            }
            heap.push(Queued(message));
        }
        self.notify.notify_one();
        Ok(())
    }

    pub fn pop(&self) -> Option<Message> {
        self.heap
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop()
            .map(|q| q.0)
    }

    pub fn len(&self) -> usize {
        self.heap.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn close(&self) {
        self.closed.store(true, AtomicOrdering::SeqCst);
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(AtomicOrdering::SeqCst)
    }

    /// Next message, waiting for one to arrive. `None` once closed and drained.
    pub async fn recv(&self) -> Option<Message> {
        loop {
            if let Some(message) = self.pop() {
                return Some(message);
            }
            if self.is_closed() {
                return None;
            }
            // notify_one stores a permit, so a push between pop() and here
            // is not lost.
            self.notify.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_domain::{MessagePayload, MessageType, SessionId};

    fn msg(kind: MessageType, sequence: u64) -> Message {
        let mut m = Message::new(
            SessionId::generate(),
            "a",
            kind,
            MessagePayload::text(format!("{}", sequence)),
        );
        m.sequence = sequence;
        m
    }

    #[test]
    fn test_priority_then_fifo() {
        let q = ListenerQueue::new(10);
        q.push(msg(MessageType::Inform, 1)).unwrap();
        q.push(msg(MessageType::Response, 2)).unwrap();
        q.push(msg(MessageType::Veto, 3)).unwrap();
        q.push(msg(MessageType::Response, 4)).unwrap();

        let order: Vec<u64> = std::iter::from_fn(|| q.pop()).map(|m| m.sequence).collect();
        assert_eq!(order, vec![3, 2, 4, 1]);
    }

    #[test]
    fn test_full_queue_rejects() {
        let q = ListenerQueue::new(1);
        q.push(msg(MessageType::Inform, 1)).unwrap();
        let rejected = q.push(msg(MessageType::Veto, 2)).unwrap_err();
        assert_eq!(rejected.sequence, 2);
        assert_eq!(q.len(), 1);
    }

    #[tokio::test]
    async fn test_recv_ends_after_close_and_drain() {
        let q = ListenerQueue::new(4);
        q.push(msg(MessageType::Request, 1)).unwrap();
        q.close();
        assert_eq!(q.recv().await.map(|m| m.sequence), Some(1));
        assert!(q.recv().await.is_none());
    }
}
