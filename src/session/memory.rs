//! In-process session provider. A test double for the Firebase adapter,
//! with a failure mode for exercising the unauthenticated path.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use uuid::Uuid;

use super::{Identity, SessionError, SessionProvider};

pub struct MemorySessionProvider {
    identity_tx: watch::Sender<Option<Identity>>,
    failure: Option<String>,
    create_calls: AtomicUsize,
}

impl MemorySessionProvider {
    /// A provider with no identity that signs in successfully.
    #[must_use]
    pub fn new() -> Self {
        Self { identity_tx: watch::Sender::new(None), failure: None, create_calls: AtomicUsize::new(0) }
    }

    /// A provider whose anonymous sign-in always fails with `reason`.
    #[must_use]
    pub fn failing(reason: &str) -> Self {
        Self { failure: Some(reason.to_owned()), ..Self::new() }
    }

    /// A provider that already holds `identity`.
    #[must_use]
    pub fn with_identity(identity: Identity) -> Self {
        let provider = Self::new();
        provider.identity_tx.send_replace(Some(identity));
        provider
    }

    /// Number of anonymous sign-in attempts so far.
    #[must_use]
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Publish a replacement identity, as a token refresh would.
    pub fn replace_identity(&self, identity: Option<Identity>) {
        self.identity_tx.send_replace(identity);
    }
}

impl Default for MemorySessionProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SessionProvider for MemorySessionProvider {
    fn observe_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.identity_tx.subscribe()
    }

    async fn create_anonymous_identity(&self) -> Result<Identity, SessionError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.failure {
            return Err(SessionError::Rejected(reason.clone()));
        }
        let uid = Uuid::new_v4().simple().to_string();
        let identity = Identity {
            id_token: format!("token-{uid}"),
            refresh_token: format!("refresh-{uid}"),
            uid,
            expires_in: Duration::from_secs(3600),
        };
        self.identity_tx.send_replace(Some(identity.clone()));
        Ok(identity)
    }
}
