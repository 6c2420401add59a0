//! Session bootstrap — anonymous identity management.
//!
//! ARCHITECTURE
//! ============
//! `SessionProvider` is the seam to the hosted authentication service. It
//! exposes the current identity as a `watch` channel so every interested
//! component (the store adapter, the UI) sees identity changes such as
//! token refreshes without polling.
//!
//! `bootstrap` runs once on startup: reuse the current identity if the
//! provider already has one, otherwise create an anonymous one. The result
//! is reported exactly once. A failed attempt is terminal; the caller stays
//! unauthenticated and sending is disabled.

pub mod firebase;
pub mod memory;

use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

// =============================================================================
// TYPES
// =============================================================================

/// An anonymous identity issued by the session provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable user id. Used as the message author.
    pub uid: String,
    /// Bearer token for store requests.
    pub id_token: String,
    pub refresh_token: String,
    /// Lifetime of `id_token` from the moment it was issued.
    pub expires_in: Duration,
}

/// The client's view of its own session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub identity: Option<Identity>,
    pub established: bool,
}

impl Session {
    #[must_use]
    pub fn unauthenticated() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn established(identity: Identity) -> Self {
        Self { identity: Some(identity), established: true }
    }

    /// The author id to stamp on outgoing messages, if signed in.
    #[must_use]
    pub fn uid(&self) -> Option<&str> {
        if !self.established {
            return None;
        }
        self.identity.as_ref().map(|i| i.uid.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("identity request failed: {0}")]
    Request(String),
    #[error("identity response error: status {status}")]
    Response { status: u16, body: String },
    #[error("identity provider rejected request: {0}")]
    Rejected(String),
    #[error("identity response parse failed: {0}")]
    Parse(String),
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
    #[error("no identity to refresh")]
    NoIdentity,
}

impl crate::error::ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Request(_) => "E_SESSION_REQUEST",
            Self::Response { .. } => "E_SESSION_RESPONSE",
            Self::Rejected(_) => "E_SESSION_REJECTED",
            Self::Parse(_) => "E_SESSION_PARSE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
            Self::NoIdentity => "E_SESSION_NO_IDENTITY",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Response { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// PROVIDER TRAIT
// =============================================================================

/// Provider-neutral async trait for identity issuance. Enables mocking in
/// tests.
#[async_trait::async_trait]
pub trait SessionProvider: Send + Sync {
    /// Subscribe to identity changes. The receiver holds the current value.
    fn observe_identity(&self) -> watch::Receiver<Option<Identity>>;

    /// The identity the provider currently holds, if any.
    fn current_identity(&self) -> Option<Identity> {
        self.observe_identity().borrow().clone()
    }

    /// Create a new anonymous identity and publish it to observers.
    ///
    /// # Errors
    ///
    /// Returns a [`SessionError`] if the provider refuses or the request
    /// fails.
    async fn create_anonymous_identity(&self) -> Result<Identity, SessionError>;
}

// =============================================================================
// BOOTSTRAP
// =============================================================================

/// Result of the one-shot session bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Established(Identity),
    Failed(String),
}

impl From<BootstrapOutcome> for Session {
    fn from(outcome: BootstrapOutcome) -> Self {
        match outcome {
            BootstrapOutcome::Established(identity) => Session::established(identity),
            BootstrapOutcome::Failed(_) => Session::unauthenticated(),
        }
    }
}

/// Establish a session: reuse the provider's identity or create one.
pub async fn bootstrap(provider: &dyn SessionProvider) -> BootstrapOutcome {
    if let Some(identity) = provider.current_identity() {
        info!(uid = %identity.uid, "session: reusing existing identity");
        return BootstrapOutcome::Established(identity);
    }

    match provider.create_anonymous_identity().await {
        Ok(identity) => {
            info!(uid = %identity.uid, "session: anonymous identity established");
            BootstrapOutcome::Established(identity)
        }
        Err(e) => {
            error!(error = %e, "session: anonymous sign-in failed");
            BootstrapOutcome::Failed(e.to_string())
        }
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
