//! Chat data model.
//!
//! DESIGN
//! ======
//! `Message` mirrors a record in the hosted message collection. The store
//! assigns `id` and `created_at`; the client only ever supplies a
//! `NewMessage`. A `ConversationView` is the materialised result of the live
//! query and is replaced wholesale on every notification.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

const AUTHOR_LABEL_LEN: usize = 6;

// =============================================================================
// MESSAGE
// =============================================================================

/// A message as stored in (and returned by) the message store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned identifier. Unique and stable once assigned.
    pub id: String,
    pub text: String,
    /// Identity (uid) of the sender.
    pub author: String,
    /// Server-assigned creation time.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Message {
    /// Short display form of the author id.
    #[must_use]
    pub fn author_label(&self) -> &str {
        self.author.get(..AUTHOR_LABEL_LEN).unwrap_or(&self.author)
    }
}

/// Append payload. The store fills in `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub text: String,
    pub author: String,
}

// =============================================================================
// ORDERING
// =============================================================================

/// Field name of the server-assigned creation timestamp.
pub const CREATED_AT_FIELD: &str = "createdAt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Ordering clause for a live query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    /// Oldest message first. The only ordering the chat view uses.
    #[must_use]
    pub fn created_at_asc() -> Self {
        Self { field: CREATED_AT_FIELD.to_owned(), direction: Direction::Ascending }
    }
}

// =============================================================================
// CONVERSATION VIEW
// =============================================================================

/// Ordered snapshot of every message matching the live query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationView {
    messages: Vec<Message>,
}

impl ConversationView {
    /// Wrap a store snapshot. Order is taken as delivered.
    #[must_use]
    pub fn from_snapshot(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Message ids in view order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().map(|m| m.id.as_str())
    }
}

#[cfg(test)]
#[path = "model_test.rs"]
mod tests;
