//! Message store — realtime-queryable collection of chat messages.
//!
//! ARCHITECTURE
//! ============
//! `MessageStore` is the seam to the hosted document database. A store
//! supports two operations: an ordered live subscription that delivers a
//! full snapshot on every change, and an append that assigns the record's
//! id and server timestamp.
//!
//! `Subscription` is the cancel handle. Dropping it (or calling
//! [`Subscription::cancel`]) runs the store's release hook, which removes
//! any store-side registration and stops further delivery. The hook lives
//! in a `ReleaseGuard` so an owner can cancel a query whose receiver has
//! been handed to someone else.

pub mod firestore;
pub mod memory;

use rand::Rng;
use tokio::sync::mpsc;

use crate::model::{Message, NewMessage, OrderBy};

const AUTO_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const AUTO_ID_LEN: usize = 20;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("message store not connected")]
    NotConnected,
    #[error("cannot order by field `{0}`")]
    UnsupportedOrdering(String),
    #[error("store request failed: {0}")]
    Request(String),
    #[error("store response error: status {status}")]
    Response { status: u16, body: String },
    #[error("store response parse failed: {0}")]
    Parse(String),
    #[error("store rejected operation: {0}")]
    Rejected(String),
}

impl crate::error::ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotConnected => "E_STORE_NOT_CONNECTED",
            Self::UnsupportedOrdering(_) => "E_STORE_ORDERING",
            Self::Request(_) => "E_STORE_REQUEST",
            Self::Response { .. } => "E_STORE_RESPONSE",
            Self::Parse(_) => "E_STORE_PARSE",
            Self::Rejected(_) => "E_STORE_REJECTED",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Response { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// One delivery from a live query: a full snapshot or an error.
pub type SnapshotEvent = Result<Vec<Message>, StoreError>;

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// Runs a store's release hook exactly once, when dropped.
pub struct ReleaseGuard {
    release: Option<ReleaseHook>,
}

impl ReleaseGuard {
    fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self { release: Some(Box::new(release)) }
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// Live query handle. Yields snapshots until cancelled or dropped.
pub struct Subscription {
    events: mpsc::UnboundedReceiver<SnapshotEvent>,
    guard: ReleaseGuard,
}

impl Subscription {
    /// Build a subscription from an event channel and a release hook that
    /// frees the store-side resources.
    pub fn new(events: mpsc::UnboundedReceiver<SnapshotEvent>, release: impl FnOnce() + Send + 'static) -> Self {
        Self { events, guard: ReleaseGuard::new(release) }
    }

    /// Wait for the next snapshot or error. `None` once the store side has
    /// shut down.
    pub async fn next(&mut self) -> Option<SnapshotEvent> {
        self.events.recv().await
    }

    /// Release store-side resources. Equivalent to dropping the handle.
    pub fn cancel(self) {}

    /// Split into the event receiver and the guard that owns the release
    /// hook, so the two can be held by different owners.
    #[must_use]
    pub fn into_parts(self) -> (mpsc::UnboundedReceiver<SnapshotEvent>, ReleaseGuard) {
        (self.events, self.guard)
    }
}

// =============================================================================
// STORE TRAIT
// =============================================================================

/// Provider-neutral async trait for the message store. Enables in-memory
/// stores in tests.
#[async_trait::async_trait]
pub trait MessageStore: Send + Sync {
    /// Whether the store currently has what it needs to serve requests
    /// (for hosted stores: a bearer identity).
    fn is_connected(&self) -> bool {
        true
    }

    /// Open a live query over `collection`. The first event is the current
    /// result set.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the ordering is unsupported or the store
    /// is not connected.
    async fn subscribe(&self, collection: &str, order_by: &OrderBy) -> Result<Subscription, StoreError>;

    /// Append one message and return its store-assigned id.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the write is rejected or the request fails.
    async fn append(&self, collection: &str, message: NewMessage) -> Result<String, StoreError>;
}

/// Generate a 20-character alphanumeric document id.
#[must_use]
pub fn auto_id() -> String {
    let mut rng = rand::rng();
    (0..AUTO_ID_LEN)
        .map(|_| char::from(AUTO_ID_ALPHABET[rng.random_range(0..AUTO_ID_ALPHABET.len())]))
        .collect()
}
