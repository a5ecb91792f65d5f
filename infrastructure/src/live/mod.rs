//! Live event stream for observers.

mod broadcast;

pub use broadcast::{BroadcastLiveEvents, LiveEvent};
