//! Sync controller — subscription lifecycle and message sending.
//!
//! DESIGN
//! ======
//! The controller owns at most one live query against the message store.
//! `subscribe` hands the caller a `ViewStream` (the receiving half) and keeps
//! the query's `ReleaseGuard` itself, so re-subscribing or closing can tear
//! the store-side registration down synchronously even while the caller
//! still holds the old stream. A generation counter makes a superseded
//! stream inert immediately, even if it has buffered events.
//!
//! Every store notification becomes a full replacement `ConversationView`.
//! Errors are surfaced as events and never end the stream; the last-known
//! view stays in place until the next good snapshot.
//!
//! `send` never touches the view. The new message shows up through the next
//! snapshot like everyone else's.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::error::ErrorCode;
use crate::model::{ConversationView, NewMessage, OrderBy};
use crate::session::Session;
use crate::store::{MessageStore, ReleaseGuard, SnapshotEvent, StoreError};

// =============================================================================
// EVENTS & ERRORS
// =============================================================================

/// One notification from the live query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Snapshot(ConversationView),
    Error(StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("message is empty")]
    EmptyText,
    #[error("not signed in")]
    NotAuthenticated,
    #[error("not connected to the message store")]
    NotConnected,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ErrorCode for SendError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyText => "E_SEND_EMPTY",
            Self::NotAuthenticated => "E_SEND_NOT_AUTHENTICATED",
            Self::NotConnected => "E_SEND_NOT_CONNECTED",
            Self::Store(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::NotConnected => true,
            Self::Store(e) => e.retryable(),
            Self::EmptyText | Self::NotAuthenticated => false,
        }
    }
}

// =============================================================================
// VIEW STREAM
// =============================================================================

/// Receiving half of a controller subscription.
pub struct ViewStream {
    events: mpsc::UnboundedReceiver<SnapshotEvent>,
    generation: u64,
    current: Arc<AtomicU64>,
    view_tx: Arc<watch::Sender<ConversationView>>,
}

impl ViewStream {
    /// Wait for the next snapshot or error. Returns `None` once the stream
    /// has been superseded, closed, or the store side has shut down.
    pub async fn next(&mut self) -> Option<SyncEvent> {
        let event = self.events.recv().await?;
        if !self.is_live() {
            return None;
        }
        match event {
            Ok(messages) => {
                let view = ConversationView::from_snapshot(messages);
                self.view_tx.send_replace(view.clone());
                Some(SyncEvent::Snapshot(view))
            }
            Err(e) => {
                warn!(error = %e, "sync: subscription error, keeping last view");
                Some(SyncEvent::Error(e))
            }
        }
    }

    /// Whether this is still the controller's active subscription.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }
}

// =============================================================================
// CONTROLLER
// =============================================================================

pub struct SyncController {
    store: Arc<dyn MessageStore>,
    collection: String,
    view_tx: Arc<watch::Sender<ConversationView>>,
    generation: Arc<AtomicU64>,
    active: Mutex<Option<ReleaseGuard>>,
}

impl SyncController {
    #[must_use]
    pub fn new(store: Arc<dyn MessageStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            view_tx: Arc::new(watch::Sender::new(ConversationView::default())),
            generation: Arc::new(AtomicU64::new(0)),
            active: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Open the live query, cancelling any previous one first.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the query cannot be opened. The previous
    /// subscription is cancelled either way.
    pub async fn subscribe(&self, order_by: &OrderBy) -> Result<ViewStream, StoreError> {
        let generation = self.cancel_active() + 1;
        self.generation.store(generation, Ordering::SeqCst);

        let subscription = self.store.subscribe(&self.collection, order_by).await?;
        let (events, guard) = subscription.into_parts();

        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if self.generation.load(Ordering::SeqCst) != generation {
            // Closed or re-subscribed while the store call was in flight.
            drop(guard);
        } else {
            *active = Some(guard);
        }
        drop(active);

        info!(collection = %self.collection, field = %order_by.field, generation, "sync: subscribed");
        Ok(ViewStream {
            events,
            generation,
            current: Arc::clone(&self.generation),
            view_tx: Arc::clone(&self.view_tx),
        })
    }

    /// Append one message authored by `session`.
    ///
    /// # Errors
    ///
    /// Rejects locally, without a store call, when the trimmed text is
    /// empty, the session is not established, or the store is offline.
    /// Store failures come back as [`SendError::Store`].
    pub async fn send(&self, session: &Session, text: &str) -> Result<String, SendError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SendError::EmptyText);
        }
        let Some(author) = session.uid() else {
            return Err(SendError::NotAuthenticated);
        };
        if !self.store.is_connected() {
            return Err(SendError::NotConnected);
        }

        let message = NewMessage { text: text.to_owned(), author: author.to_owned() };
        match self.store.append(&self.collection, message).await {
            Ok(id) => {
                info!(%id, author, len = text.len(), "sync: message sent");
                Ok(id)
            }
            Err(e) => {
                warn!(author, error = %e, "sync: append failed");
                Err(SendError::Store(e))
            }
        }
    }

    /// Last-known view.
    #[must_use]
    pub fn view(&self) -> ConversationView {
        self.view_tx.borrow().clone()
    }

    /// Receiver that observes every view replacement.
    #[must_use]
    pub fn watch_view(&self) -> watch::Receiver<ConversationView> {
        self.view_tx.subscribe()
    }

    /// Cancel the live query. Idempotent.
    pub fn close(&self) {
        let generation = self.cancel_active() + 1;
        self.generation.store(generation, Ordering::SeqCst);
        info!(collection = %self.collection, "sync: closed");
    }

    /// Drop the active guard (releasing the store registration) and return
    /// the generation that was current.
    fn cancel_active(&self) -> u64 {
        let previous = self.active.lock().unwrap_or_else(PoisonError::into_inner).take();
        drop(previous);
        self.generation.load(Ordering::SeqCst)
    }
}

impl Drop for SyncController {
    fn drop(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;
