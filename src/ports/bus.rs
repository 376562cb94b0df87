// ABOUTME: Topic-based event bus port with explicit subscription handles.
// ABOUTME: LocalBus is the in-process implementation used by the simulator and tests.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::{DeviceSerial, DeviceStatusUpdate, MaintainGroupKind, MaintainReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    DeviceStatusChanged,
    MaintainGroupUpdated,
    StopMaintainTypeChanged,
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::DeviceStatusChanged => write!(f, "device-status-changed"),
            Topic::MaintainGroupUpdated => write!(f, "maintain-group-updated"),
            Topic::StopMaintainTypeChanged => write!(f, "stop-maintain-type-changed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    DeviceStatusChanged(DeviceStatusUpdate),
    MaintainGroupUpdated(MaintainReport),
    /// A device asks for a different maintenance group on its next power-off.
    StopMaintainTypeChanged {
        serial: DeviceSerial,
        kind: MaintainGroupKind,
    },
}

impl BusEvent {
    pub fn topic(&self) -> Topic {
        match self {
            BusEvent::DeviceStatusChanged(_) => Topic::DeviceStatusChanged,
            BusEvent::MaintainGroupUpdated(_) => Topic::MaintainGroupUpdated,
            BusEvent::StopMaintainTypeChanged { .. } => Topic::StopMaintainTypeChanged,
        }
    }
}

/// Callback invoked for every event published on a subscribed topic.
///
/// Handlers run on the publisher's thread and must not block.
pub type Handler = Arc<dyn Fn(&BusEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub trait EventBus: Send + Sync {
    fn subscribe(&self, topic: Topic, handler: Handler) -> SubscriptionId;

    /// Remove a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

/// A live subscription that is released on `unsubscribe()` or drop.
pub struct Subscription {
    bus: Arc<dyn EventBus>,
    topic: Topic,
    id: Option<SubscriptionId>,
}

impl Subscription {
    pub fn new(bus: Arc<dyn EventBus>, topic: Topic, handler: Handler) -> Self {
        let id = bus.subscribe(topic, handler);
        tracing::trace!(%topic, ?id, "subscribed");
        Self {
            bus,
            topic,
            id: Some(id),
        }
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(id) = self.id.take() {
            self.bus.unsubscribe(id);
            tracing::trace!(topic = %self.topic, ?id, "unsubscribed");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("id", &self.id)
            .finish()
    }
}

/// Synchronous in-process event bus.
#[derive(Default)]
pub struct LocalBus {
    next_id: AtomicU64,
    handlers: Mutex<Vec<(SubscriptionId, Topic, Handler)>>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to every handler subscribed to its topic.
    pub fn publish(&self, event: BusEvent) {
        let topic = event.topic();
        // Handlers may subscribe or unsubscribe, so call them outside the lock.
        let targets: Vec<Handler> = self
            .handlers
            .lock()
            .iter()
            .filter(|(_, t, _)| *t == topic)
            .map(|(_, _, h)| Arc::clone(h))
            .collect();

        tracing::trace!(%topic, handlers = targets.len(), "publishing event");
        for handler in targets {
            handler(&event);
        }
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.handlers
            .lock()
            .iter()
            .filter(|(_, t, _)| *t == topic)
            .count()
    }
}

impl EventBus for LocalBus {
    fn subscribe(&self, topic: Topic, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.lock().push((id, topic, handler));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.handlers.lock().retain(|(sid, _, _)| *sid != id);
    }
}
