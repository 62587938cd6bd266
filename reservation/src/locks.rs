//! Per-event exclusivity for the reservation path.
//!
//! One async mutex per event id, looked up from a registry. The registry
//! only holds weak references, so an event nobody is reserving costs a dead
//! map entry until the next prune. Events never share a mutex.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

use booking::model::EventId;

/// Dead entries are swept once the map grows past this size. After a sweep
/// the mark moves to twice the surviving entries, so a map full of live
/// locks is not rescanned on every insert.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Error)]
#[error("timed out after {waited:?} waiting for the lock on event {event_id}")]
pub struct LockTimeout {
    pub event_id: EventId,
    pub waited: Duration,
}

/// Held while one caller re-validates and commits for an event.
#[derive(Debug)]
pub struct EventGuard {
    event_id: EventId,
    _guard: OwnedMutexGuard<()>,
}

impl EventGuard {
    pub fn event_id(&self) -> EventId {
        self.event_id
    }
}

#[derive(Debug)]
struct Slots {
    map: HashMap<EventId, Weak<Mutex<()>>>,
    prune_at: usize,
}

impl Default for Slots {
    fn default() -> Self {
        Self {
            map: HashMap::new(),
            prune_at: PRUNE_THRESHOLD,
        }
    }
}

#[derive(Debug, Default)]
pub struct LockRegistry {
    slots: parking_lot::Mutex<Slots>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, event_id: EventId) -> Arc<Mutex<()>> {
        let mut slots = self.slots.lock();

        if let Some(live) = slots.map.get(&event_id).and_then(Weak::upgrade) {
            return live;
        }

        if slots.map.len() >= slots.prune_at {
            slots.map.retain(|_, w| w.strong_count() > 0);
            slots.prune_at = (slots.map.len() * 2).max(PRUNE_THRESHOLD);
        }

        let fresh = Arc::new(Mutex::new(()));
        slots.map.insert(event_id, Arc::downgrade(&fresh));
        fresh
    }

    /// Wait at most `wait` for exclusive access to `event_id`.
    pub async fn acquire(&self, event_id: EventId, wait: Duration) -> Result<EventGuard, LockTimeout> {
        let slot = self.slot(event_id);

        match tokio::time::timeout(wait, slot.lock_owned()).await {
            Ok(guard) => Ok(EventGuard {
                event_id,
                _guard: guard,
            }),
            Err(_) => Err(LockTimeout {
                event_id,
                waited: wait,
            }),
        }
    }

    /// Events with at least one holder or waiter.
    pub fn active(&self) -> usize {
        self.slots
            .lock()
            .map
            .values()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Map entries, live or dead.
    pub fn tracked(&self) -> usize {
        self.slots.lock().map.len()
    }
}
