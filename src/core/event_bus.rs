use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::models::{HostEvent, HostEventKind};

pub type EventHandler = Arc<dyn Fn(&HostEvent) + Send + Sync>;

/// Source of host-pushed notifications.
pub trait HostEvents: Send + Sync {
    /// Registers `handler` for `kind`; dropping the returned handle unregisters it.
    fn listen(&self, kind: HostEventKind, handler: EventHandler) -> Subscription;
}

/// Registration handle. Released exactly once, on drop or `unsubscribe`.
#[must_use = "dropping a Subscription unregisters its handler"]
pub struct Subscription {
    kind: HostEventKind,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(kind: HostEventKind, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            kind,
            release: Some(Box::new(release)),
        }
    }

    pub fn kind(&self) -> HostEventKind {
        self.kind
    }

    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("active", &self.release.is_some())
            .finish()
    }
}

struct Listener {
    id: u64,
    kind: HostEventKind,
    handler: EventHandler,
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    listeners: Mutex<Vec<Listener>>,
}

/// In-process event source. Hosts that live in the same process emit into it.
#[derive(Clone, Default)]
pub struct LocalEventBus {
    inner: Arc<BusInner>,
}

impl LocalEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `event` to every handler registered for its kind; returns how many ran.
    pub fn emit(&self, event: HostEvent) -> usize {
        let kind = event.kind();
        // Handlers may subscribe or unsubscribe, so run them outside the lock.
        let handlers: Vec<EventHandler> = self
            .inner
            .listeners
            .lock()
            .iter()
            .filter(|l| l.kind == kind)
            .map(|l| Arc::clone(&l.handler))
            .collect();

        for handler in &handlers {
            handler(&event);
        }
        handlers.len()
    }

    pub fn emit_wire(&self, name: &str, payload: &str) -> anyhow::Result<usize> {
        let event = HostEvent::from_wire(name, payload)?;
        Ok(self.emit(event))
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    pub fn listener_count_for(&self, kind: HostEventKind) -> usize {
        self.inner
            .listeners
            .lock()
            .iter()
            .filter(|l| l.kind == kind)
            .count()
    }
}

fn remove_listener(inner: &Weak<BusInner>, id: u64) {
    if let Some(inner) = inner.upgrade() {
        inner.listeners.lock().retain(|l| l.id != id);
    }
}

impl HostEvents for LocalEventBus {
    fn listen(&self, kind: HostEventKind, handler: EventHandler) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push(Listener { id, kind, handler });

        let weak = Arc::downgrade(&self.inner);
        Subscription::new(kind, move || remove_listener(&weak, id))
    }
}
