//! Change notification
//!
//! Mutations announce the path they touched, in caller form, once their
//! transaction has committed. Delivery is fire-and-forget.

use parking_lot::Mutex;

/// Event broadcast after a path was written
pub const EVENT_UPDATED: &str = "updated";
/// Event broadcast after a path was removed
pub const EVENT_DELETED: &str = "deleted";

/// Receiver of change events
pub trait EventBus: Send + Sync {
    /// Deliver one event
    fn broadcast(&self, event: &str, path: &str);
}

/// Bus that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventBus;

impl EventBus for NoopEventBus {
    fn broadcast(&self, _event: &str, _path: &str) {}
}

/// Bus that keeps every event in memory
#[derive(Debug, Default)]
pub struct CollectingEventBus {
    events: Mutex<Vec<(String, String)>>,
}

impl CollectingEventBus {
    /// Empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return the collected `(event, path)` pairs
    pub fn take(&self) -> Vec<(String, String)> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Number of collected events
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing was collected
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventBus for CollectingEventBus {
    fn broadcast(&self, event: &str, path: &str) {
        self.events.lock().push((event.to_string(), path.to_string()));
    }
}

/// An event waiting for its transaction to commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingEvent {
    pub(crate) event: &'static str,
    pub(crate) path: String,
}

pub(crate) fn deliver(bus: &dyn EventBus, events: Vec<PendingEvent>) {
    for e in events {
        bus.broadcast(e.event, &e.path);
    }
}
