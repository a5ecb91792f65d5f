//! In-process message bus.
//!
//! ```text
//!                 publish(message)
//!                        │  (one critical section)
//!          ┌─────────────┴──────────────┐
//!          ▼                            ▼
//!  per-session listener queues     global broadcast
//!  (priority, then FIFO)           (best effort, lagging
//!          │                        observers skip ahead)
//!          ▼
//!  full queue ──▶ dead-letter log
//! ```

pub mod message_bus;
pub mod queue;

pub use message_bus::{BusStats, DeadLetter, MessageBus, SessionSubscription};
