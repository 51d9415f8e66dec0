//! Store change notifications.
//!
//! The registry belongs to one service instance and is cleared when that
//! service closes. Each notification carries a generation number and every
//! listener remembers the newest generation it has seen, so a listener hears
//! about a given transition at most once even when it is delivered from two
//! places. A listener that panics is logged and skipped; the others still run.

use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    /// The store finished connecting and accepts requests.
    Ready,
    /// An import replaced stored data; cached state was refreshed.
    Imported,
    /// The service shut down.
    Closed,
}

pub trait StoreListener: Send + Sync {
    fn on_event(&self, event: StoreEvent);
}

impl<F> StoreListener for F
where
    F: Fn(StoreEvent) + Send + Sync,
{
    fn on_event(&self, event: StoreEvent) {
        self(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Entry {
    id: ListenerId,
    listener: Arc<dyn StoreListener>,
    seen: AtomicU64,
}

impl Entry {
    fn deliver(&self, event: StoreEvent, generation: u64) {
        if self.seen.fetch_max(generation, Ordering::AcqRel) >= generation {
            return;
        }
        let listener = &self.listener;
        if catch_unwind(AssertUnwindSafe(|| listener.on_event(event))).is_err() {
            warn!("Listener {:?} failed while handling {:?}", self.id, event);
        }
    }
}

#[derive(Default)]
pub struct Listeners {
    entries: Mutex<Vec<Arc<Entry>>>,
    next_id: AtomicU64,
    generation: AtomicU64,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, listener: Arc<dyn StoreListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().push(Arc::new(Entry {
            id,
            listener,
            seen: AtomicU64::new(0),
        }));
        id
    }

    pub fn unregister(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        entries.len() != before
    }

    /// Reserves the generation number for a new transition.
    pub fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Delivers `event` to every registered listener. Listeners run on the
    /// calling thread, outside the registry lock.
    pub fn deliver(&self, event: StoreEvent, generation: u64) {
        let entries: Vec<Arc<Entry>> = self.entries.lock().clone();
        for entry in entries {
            entry.deliver(event, generation);
        }
    }

    /// Delivers an earlier transition to one listener that missed it.
    pub fn deliver_to(&self, id: ListenerId, event: StoreEvent, generation: u64) {
        let entry = self.entries.lock().iter().find(|e| e.id == id).cloned();
        if let Some(entry) = entry {
            entry.deliver(event, generation);
        }
    }

    pub fn notify(&self, event: StoreEvent) {
        self.deliver(event, self.next_generation());
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, Arc<dyn StoreListener>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let listener: Arc<dyn StoreListener> = Arc::new(move |_: StoreEvent| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (count, listener)
    }

    #[test]
    fn transition_is_delivered_at_most_once() {
        let listeners = Listeners::new();
        let (count, listener) = counter();
        let id = listeners.register(listener);
        let generation = listeners.next_generation();
        listeners.deliver(StoreEvent::Ready, generation);
        listeners.deliver_to(id, StoreEvent::Ready, generation);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        listeners.notify(StoreEvent::Imported);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failing_listener_does_not_block_others() {
        let listeners = Listeners::new();
        listeners.register(Arc::new(|_: StoreEvent| panic!("listener failure")));
        let (count, listener) = counter();
        listeners.register(listener);
        listeners.notify(StoreEvent::Ready);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unregistered_listener_hears_nothing() {
        let listeners = Listeners::new();
        let (count, listener) = counter();
        let id = listeners.register(listener);
        assert!(listeners.unregister(id));
        listeners.notify(StoreEvent::Ready);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(listeners.is_empty());
    }
}
