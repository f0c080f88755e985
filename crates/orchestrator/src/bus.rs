//! In-process event fan-out.
//!
//! Listeners are plain callbacks held in a single owned list; subscribing
//! returns a [`Subscription`] capability that removes the entry when
//! invoked. Publication is synchronous from the caller's perspective, so
//! listeners that need to do slow work must hand off.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use concord_domain::event::GameEvent;

type Callback = Arc<dyn Fn(&GameEvent) + Send + Sync>;

#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

#[derive(Default)]
struct BusInner {
    listeners: Mutex<Vec<(u64, Callback)>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. The returned capability unsubscribes it.
    pub fn subscribe(
        &self,
        callback: impl Fn(&GameEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push((id, Arc::new(callback)));
        Subscription {
            bus: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Deliver an event to every current listener, in subscription order.
    pub fn publish(&self, event: &GameEvent) {
        // Snapshot the callbacks so a listener may subscribe or unsubscribe
        // from inside its own invocation without deadlocking.
        let callbacks: Vec<Callback> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in callbacks {
            callback(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }
}

/// Capability returned by [`EventBus::subscribe`]. Calling
/// [`Subscription::unsubscribe`] more than once is a no-op.
pub struct Subscription {
    bus: Weak<BusInner>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.listeners.lock().retain(|(id, _)| *id != self.id);
        }
    }
}
