//! Firestore REST adapter.
//!
//! DESIGN
//! ======
//! Appends go through `documents:commit` with a `REQUEST_TIME` transform on
//! `createdAt`, so the timestamp is assigned by the server exactly like the
//! web SDK's `serverTimestamp()`. Document ids are generated client-side in
//! the same 20-character format the SDKs use.
//!
//! The REST surface has no push channel, so a live query is a polling task
//! that runs `documents:runQuery` on an interval and forwards the result
//! only when it differs from the last delivered snapshot. Cancelling the
//! subscription aborts the task.
//!
//! Requests authenticate with the current anonymous identity's id token,
//! read from the identity watch channel on every call so refreshed tokens
//! are picked up without re-subscribing.

use std::time::Duration;

use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::{MessageStore, SnapshotEvent, StoreError, Subscription, auto_id};
use crate::model::{CREATED_AT_FIELD, Direction, Message, NewMessage, OrderBy};
use crate::session::Identity;

const API_URL: &str = "https://firestore.googleapis.com/v1";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const CONNECT_TIMEOUT_SECS: u64 = 10;

const TEXT_FIELD: &str = "text";
const AUTHOR_FIELD: &str = "author";

// =============================================================================
// CLIENT
// =============================================================================

#[derive(Clone)]
pub struct FirestoreStore {
    http: reqwest::Client,
    api_key: String,
    /// `projects/{project}/databases/(default)`
    database: String,
    identity: watch::Receiver<Option<Identity>>,
    poll_interval: Duration,
}

impl FirestoreStore {
    /// Build a store for `project_id`, authenticating with whatever identity
    /// the watch channel currently holds.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Request`] if the HTTP client cannot be built.
    pub fn new(
        project_id: &str,
        api_key: String,
        identity: watch::Receiver<Option<Identity>>,
        poll_interval: Duration,
    ) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| StoreError::Request(e.to_string()))?;
        Ok(Self {
            http,
            api_key,
            database: format!("projects/{project_id}/databases/(default)"),
            identity,
            poll_interval,
        })
    }

    fn bearer(&self) -> Result<String, StoreError> {
        self.identity
            .borrow()
            .as_ref()
            .map(|identity| identity.id_token.clone())
            .ok_or(StoreError::NotConnected)
    }

    async fn post(&self, action: &str, body: &Value) -> Result<String, StoreError> {
        let token = self.bearer()?;
        let url = format!("{API_URL}/{}/documents:{action}", self.database);
        let response = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        if status != 200 {
            return Err(error_from_response(status, text));
        }
        Ok(text)
    }

    async fn run_query(&self, query: &Value) -> Result<Vec<Message>, StoreError> {
        let text = self.post("runQuery", query).await?;
        parse_run_query_response(&text)
    }
}

#[async_trait::async_trait]
impl MessageStore for FirestoreStore {
    fn is_connected(&self) -> bool {
        self.identity.borrow().is_some()
    }

    async fn subscribe(&self, collection: &str, order_by: &OrderBy) -> Result<Subscription, StoreError> {
        self.bearer()?;

        let query = build_run_query(collection, order_by);
        let (tx, rx) = mpsc::unbounded_channel();
        let store = self.clone();
        let collection = collection.to_owned();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(store.poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut state = PollState::default();

            loop {
                interval.tick().await;
                if tx.is_closed() {
                    break;
                }
                let Some(event) = state.observe(store.run_query(&query).await) else {
                    continue;
                };
                if let Err(e) = &event {
                    warn!(error = %e, %collection, "firestore: poll failed");
                }
                if tx.send(event).is_err() {
                    break;
                }
            }
            debug!(%collection, "firestore: poll task stopped");
        });

        Ok(Subscription::new(rx, move || handle.abort()))
    }

    async fn append(&self, collection: &str, message: NewMessage) -> Result<String, StoreError> {
        let id = auto_id();
        let body = build_commit_request(&self.database, collection, &id, &message);
        self.post("commit", &body).await?;
        Ok(id)
    }
}

// =============================================================================
// POLLING
// =============================================================================

/// What the poll loop has already delivered.
#[derive(Debug, Default)]
pub(crate) struct PollState {
    last_snapshot: Option<Vec<Message>>,
    last_error: Option<StoreError>,
}

impl PollState {
    /// Decide whether one poll result is worth delivering. Unchanged
    /// snapshots are dropped, and an error is reported once until a poll
    /// succeeds again.
    pub(crate) fn observe(&mut self, result: Result<Vec<Message>, StoreError>) -> Option<SnapshotEvent> {
        match result {
            Ok(messages) => {
                self.last_error = None;
                if self.last_snapshot.as_ref() == Some(&messages) {
                    return None;
                }
                self.last_snapshot = Some(messages.clone());
                Some(Ok(messages))
            }
            Err(e) => {
                if self.last_error.as_ref() == Some(&e) {
                    return None;
                }
                self.last_error = Some(e.clone());
                Some(Err(e))
            }
        }
    }
}

// =============================================================================
// WIRE FORMAT
// =============================================================================

pub(crate) fn build_run_query(collection: &str, order_by: &OrderBy) -> Value {
    let direction = match order_by.direction {
        Direction::Ascending => "ASCENDING",
        Direction::Descending => "DESCENDING",
    };
    json!({
        "structuredQuery": {
            "from": [{ "collectionId": collection }],
            "orderBy": [{ "field": { "fieldPath": order_by.field }, "direction": direction }],
        }
    })
}

pub(crate) fn build_commit_request(database: &str, collection: &str, id: &str, message: &NewMessage) -> Value {
    json!({
        "writes": [{
            "update": {
                "name": format!("{database}/documents/{collection}/{id}"),
                "fields": {
                    TEXT_FIELD: { "stringValue": message.text },
                    AUTHOR_FIELD: { "stringValue": message.author },
                },
            },
            "currentDocument": { "exists": false },
            "updateTransforms": [{ "fieldPath": CREATED_AT_FIELD, "setToServerValue": "REQUEST_TIME" }],
        }]
    })
}

pub(crate) fn parse_run_query_response(json_text: &str) -> Result<Vec<Message>, StoreError> {
    let root: Value = serde_json::from_str(json_text).map_err(|e| StoreError::Parse(e.to_string()))?;
    let Some(rows) = root.as_array() else {
        return Err(StoreError::Parse("runQuery: expected a JSON array".to_string()));
    };

    // Rows without a `document` carry only a readTime (empty result or
    // progress marker).
    let messages = rows
        .iter()
        .filter_map(|row| row.get("document"))
        .filter_map(|doc| {
            let parsed = parse_document(doc);
            if parsed.is_none() {
                let name = doc.get("name").and_then(Value::as_str).unwrap_or("");
                warn!(name, "firestore: skipping malformed document");
            }
            parsed
        })
        .collect();
    Ok(messages)
}

pub(crate) fn parse_document(doc: &Value) -> Option<Message> {
    let id = doc.get("name")?.as_str()?.rsplit('/').next()?.to_owned();
    let fields = doc.get("fields")?;
    let string_field = |name: &str| {
        fields
            .get(name)
            .and_then(|f| f.get("stringValue"))
            .and_then(Value::as_str)
            .map(str::to_owned)
    };
    let text = string_field(TEXT_FIELD)?;
    let author = string_field(AUTHOR_FIELD)?;
    let created_at = fields
        .get(CREATED_AT_FIELD)
        .and_then(|f| f.get("timestampValue"))
        .and_then(Value::as_str)
        .and_then(|raw| OffsetDateTime::parse(raw, &Rfc3339).ok())?;
    if id.is_empty() {
        return None;
    }
    Some(Message { id, text, author, created_at })
}

pub(crate) fn error_from_response(status: u16, body: String) -> StoreError {
    if status == 429 || status >= 500 {
        return StoreError::Response { status, body };
    }
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .map(str::to_owned)
        });
    match message {
        Some(message) => StoreError::Rejected(message),
        None => StoreError::Response { status, body },
    }
}

#[cfg(test)]
#[path = "firestore_test.rs"]
mod tests;
