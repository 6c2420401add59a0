//! In-process message store.
//!
//! DESIGN
//! ======
//! Holds every collection in memory and pushes a full snapshot to each
//! subscriber of a collection whenever it changes, the same way a hosted
//! realtime store notifies listeners. Timestamps are assigned at append
//! time and forced strictly increasing so `created_at` ordering is total.
//!
//! A test double for the Firestore adapter. Failure injection
//! (`fail_next_append`, `push_error`, `set_connected`) exercises the
//! controller's error paths without a network.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use time::{Duration, OffsetDateTime};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use super::{MessageStore, SnapshotEvent, StoreError, Subscription, auto_id};
use crate::model::{CREATED_AT_FIELD, Direction, Message, NewMessage, OrderBy};

// =============================================================================
// STATE
// =============================================================================

struct Subscriber {
    collection: String,
    direction: Direction,
    tx: mpsc::UnboundedSender<SnapshotEvent>,
}

struct MemoryInner {
    /// Messages per collection, in creation order.
    collections: HashMap<String, Vec<Message>>,
    /// Live queries keyed by registration id.
    subscribers: HashMap<Uuid, Subscriber>,
    last_created_at: Option<OffsetDateTime>,
    append_failures: VecDeque<StoreError>,
    connected: bool,
    append_calls: usize,
}

impl MemoryInner {
    fn snapshot(&self, collection: &str, direction: Direction) -> Vec<Message> {
        let mut messages = self
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default();
        if direction == Direction::Descending {
            messages.reverse();
        }
        messages
    }

    fn next_created_at(&mut self) -> OffsetDateTime {
        let now = OffsetDateTime::now_utc();
        let ts = match self.last_created_at {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_created_at = Some(ts);
        ts
    }

    /// Deliver `event_for(direction)` to every subscriber of `collection`,
    /// dropping registrations whose receiver has gone away.
    fn notify(&mut self, collection: &str, event_for: impl Fn(&Self, Direction) -> SnapshotEvent) {
        let targets: Vec<(Uuid, Direction)> = self
            .subscribers
            .iter()
            .filter(|(_, sub)| sub.collection == collection)
            .map(|(id, sub)| (*id, sub.direction))
            .collect();

        for (id, direction) in targets {
            let event = event_for(self, direction);
            let closed = self
                .subscribers
                .get(&id)
                .is_some_and(|sub| sub.tx.send(event).is_err());
            if closed {
                self.subscribers.remove(&id);
                debug!(%id, collection, "memory store: pruned closed subscriber");
            }
        }
    }
}

// =============================================================================
// STORE
// =============================================================================

/// Shared in-memory store. Clones refer to the same data.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryInner {
                collections: HashMap::new(),
                subscribers: HashMap::new(),
                last_created_at: None,
                append_failures: VecDeque::new(),
                connected: true,
                append_calls: 0,
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Toggle connectivity. While disconnected, subscribe and append fail
    /// with [`StoreError::NotConnected`].
    pub fn set_connected(&self, connected: bool) {
        self.lock().connected = connected;
    }

    /// Make the next append fail with `err` instead of writing.
    pub fn fail_next_append(&self, err: StoreError) {
        self.lock().append_failures.push_back(err);
    }

    /// Deliver an error event to every live query on `collection`.
    pub fn push_error(&self, collection: &str, err: StoreError) {
        self.lock().notify(collection, |_, _| Err(err.clone()));
    }

    /// Number of live queries currently registered.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Number of append calls received, including rejected ones.
    #[must_use]
    pub fn append_calls(&self) -> usize {
        self.lock().append_calls
    }

    /// Current contents of `collection` in creation order.
    #[must_use]
    pub fn messages(&self, collection: &str) -> Vec<Message> {
        self.lock().snapshot(collection, Direction::Ascending)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MessageStore for MemoryStore {
    fn is_connected(&self) -> bool {
        self.lock().connected
    }

    async fn subscribe(&self, collection: &str, order_by: &OrderBy) -> Result<Subscription, StoreError> {
        if order_by.field != CREATED_AT_FIELD {
            return Err(StoreError::UnsupportedOrdering(order_by.field.clone()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        {
            let mut inner = self.lock();
            if !inner.connected {
                return Err(StoreError::NotConnected);
            }
            // Initial result set, like a hosted listener's first callback.
            let _ = tx.send(Ok(inner.snapshot(collection, order_by.direction)));
            inner.subscribers.insert(
                id,
                Subscriber { collection: collection.to_owned(), direction: order_by.direction, tx },
            );
            debug!(%id, collection, subscribers = inner.subscribers.len(), "memory store: subscribed");
        }

        let weak: Weak<Mutex<MemoryInner>> = Arc::downgrade(&self.inner);
        Ok(Subscription::new(rx, move || {
            if let Some(inner) = weak.upgrade() {
                let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
                inner.subscribers.remove(&id);
                debug!(%id, subscribers = inner.subscribers.len(), "memory store: released");
            }
        }))
    }

    async fn append(&self, collection: &str, message: NewMessage) -> Result<String, StoreError> {
        let mut inner = self.lock();
        inner.append_calls += 1;

        if !inner.connected {
            return Err(StoreError::NotConnected);
        }
        if let Some(err) = inner.append_failures.pop_front() {
            return Err(err);
        }

        let id = auto_id();
        let created_at = inner.next_created_at();
        inner
            .collections
            .entry(collection.to_owned())
            .or_default()
            .push(Message { id: id.clone(), text: message.text, author: message.author, created_at });

        inner.notify(collection, |state, direction| Ok(state.snapshot(collection, direction)));
        Ok(id)
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
