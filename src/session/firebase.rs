//! Firebase anonymous authentication over the Identity Toolkit REST API.
//!
//! Thin HTTP wrapper for `accounts:signUp` and the secure-token refresh
//! endpoint. Pure parsing in `parse_sign_up_response` and
//! `parse_refresh_response` for testability.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{Identity, SessionError, SessionProvider};

const SIGN_UP_URL: &str = "https://identitytoolkit.googleapis.com/v1/accounts:signUp";
const REFRESH_URL: &str = "https://securetoken.googleapis.com/v1/token";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Refresh this long before the id token expires.
const REFRESH_MARGIN: Duration = Duration::from_secs(300);
const MIN_REFRESH_DELAY: Duration = Duration::from_secs(30);
const REFRESH_RETRY_DELAY: Duration = Duration::from_secs(60);

// =============================================================================
// CLIENT
// =============================================================================

pub struct AnonymousAuth {
    http: reqwest::Client,
    api_key: String,
    app_id: String,
    identity_tx: watch::Sender<Option<Identity>>,
}

impl AnonymousAuth {
    /// # Errors
    ///
    /// Returns [`SessionError::HttpClientBuild`] if the HTTP client cannot be
    /// built.
    pub fn new(api_key: String, app_id: String) -> Result<Self, SessionError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| SessionError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, api_key, app_id, identity_tx: watch::Sender::new(None) })
    }

    /// Exchange the current refresh token for a new id token and publish
    /// the refreshed identity.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoIdentity`] if nobody is signed in, or a
    /// request/parse error from the token endpoint.
    pub async fn refresh(&self) -> Result<Identity, SessionError> {
        let Some(current) = self.identity_tx.borrow().clone() else {
            return Err(SessionError::NoIdentity);
        };

        let response = self
            .http
            .post(REFRESH_URL)
            .query(&[("key", self.api_key.as_str())])
            .header("X-Firebase-gmpid", &self.app_id)
            .form(&[("grant_type", "refresh_token"), ("refresh_token", current.refresh_token.as_str())])
            .send()
            .await
            .map_err(|e| SessionError::Request(e.to_string()))?;
        let text = read_body(response).await?;

        let identity = parse_refresh_response(&text)?;
        self.identity_tx.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    /// Keep the id token fresh for as long as the returned task runs.
    /// Stops when there is no identity to refresh.
    pub fn spawn_refresh_task(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let Some(expires_in) = self.identity_tx.borrow().as_ref().map(|i| i.expires_in) else {
                return;
            };
            let mut delay = refresh_delay(expires_in);
            loop {
                tokio::time::sleep(delay).await;

                let result = self.refresh().await;
                match &result {
                    Ok(identity) => info!(uid = %identity.uid, "session: id token refreshed"),
                    Err(SessionError::NoIdentity) => {}
                    Err(e) => warn!(error = %e, retry_secs = REFRESH_RETRY_DELAY.as_secs(), "session: id token refresh failed"),
                }
                let Some(next) = next_refresh_delay(&result) else {
                    break;
                };
                delay = next;
            }
        })
    }
}

#[async_trait::async_trait]
impl SessionProvider for AnonymousAuth {
    fn observe_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.identity_tx.subscribe()
    }

    async fn create_anonymous_identity(&self) -> Result<Identity, SessionError> {
        let response = self
            .http
            .post(SIGN_UP_URL)
            .query(&[("key", self.api_key.as_str())])
            .header("X-Firebase-gmpid", &self.app_id)
            .json(&serde_json::json!({ "returnSecureToken": true }))
            .send()
            .await
            .map_err(|e| SessionError::Request(e.to_string()))?;
        let text = read_body(response).await?;

        let identity = parse_sign_up_response(&text)?;
        self.identity_tx.send_replace(Some(identity.clone()));
        Ok(identity)
    }
}

async fn read_body(response: reqwest::Response) -> Result<String, SessionError> {
    let status = response.status().as_u16();
    let text = response
        .text()
        .await
        .map_err(|e| SessionError::Request(e.to_string()))?;
    if status != 200 {
        return Err(error_from_response(status, text));
    }
    Ok(text)
}

pub(crate) fn refresh_delay(expires_in: Duration) -> Duration {
    expires_in
        .saturating_sub(REFRESH_MARGIN)
        .max(MIN_REFRESH_DELAY)
}

/// How long to wait before the next refresh attempt, given the outcome of
/// the last one. A failure retries soon instead of waiting out the old
/// token's lifetime. `None` stops the refresh loop.
pub(crate) fn next_refresh_delay(result: &Result<Identity, SessionError>) -> Option<Duration> {
    match result {
        Ok(identity) => Some(refresh_delay(identity.expires_in)),
        Err(SessionError::NoIdentity) => None,
        Err(_) => Some(REFRESH_RETRY_DELAY),
    }
}

// =============================================================================
// PARSING
// =============================================================================

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
    local_id: String,
}

#[derive(serde::Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
    user_id: String,
}

fn parse_expires_in(raw: &str) -> Result<Duration, SessionError> {
    raw.parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| SessionError::Parse(format!("invalid expiresIn: {raw}")))
}

pub(crate) fn parse_sign_up_response(json: &str) -> Result<Identity, SessionError> {
    let resp: SignUpResponse = serde_json::from_str(json).map_err(|e| SessionError::Parse(e.to_string()))?;
    Ok(Identity {
        uid: resp.local_id,
        id_token: resp.id_token,
        refresh_token: resp.refresh_token,
        expires_in: parse_expires_in(&resp.expires_in)?,
    })
}

pub(crate) fn parse_refresh_response(json: &str) -> Result<Identity, SessionError> {
    let resp: RefreshResponse = serde_json::from_str(json).map_err(|e| SessionError::Parse(e.to_string()))?;
    Ok(Identity {
        uid: resp.user_id,
        id_token: resp.id_token,
        refresh_token: resp.refresh_token,
        expires_in: parse_expires_in(&resp.expires_in)?,
    })
}

pub(crate) fn error_from_response(status: u16, body: String) -> SessionError {
    if status == 429 || status >= 500 {
        return SessionError::Response { status, body };
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
        Some(message) => SessionError::Rejected(message),
        None => SessionError::Response { status, body },
    }
}

#[cfg(test)]
#[path = "firebase_test.rs"]
mod tests;
