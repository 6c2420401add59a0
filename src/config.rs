//! Application configuration parsed from environment variables.
//!
//! DESIGN
//! ======
//! All hosted-service settings are required. `AppConfig::from_lookup`
//! collects every missing name before failing so the remediation screen can
//! list them all at once. Optional knobs fall back to defaults. Parsing goes
//! through a lookup function; `from_env` binds it to the process
//! environment.

use std::time::Duration;

use crate::assistant::config::{GEMINI_API_KEY_VAR, GeminiConfig};

pub const DEFAULT_COLLECTION: &str = "messages";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const MIN_POLL_INTERVAL_MS: u64 = 100;

/// Every variable that must be set for the client to start.
pub const REQUIRED_VARS: [&str; 7] = [
    "FIREBASE_API_KEY",
    "FIREBASE_AUTH_DOMAIN",
    "FIREBASE_PROJECT_ID",
    "FIREBASE_STORAGE_BUCKET",
    "FIREBASE_MESSAGING_SENDER_ID",
    "FIREBASE_APP_ID",
    GEMINI_API_KEY_VAR,
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
}

impl crate::error::ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Missing(_) => "E_CONFIG_MISSING",
        }
    }
}

// =============================================================================
// TYPES
// =============================================================================

/// Hosted auth + document store project settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirebaseConfig {
    pub api_key: String,
    pub auth_domain: String,
    pub project_id: String,
    pub storage_bucket: String,
    pub messaging_sender_id: String,
    pub app_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    pub collection: String,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub firebase: FirebaseConfig,
    pub gemini: GeminiConfig,
    pub chat: ChatConfig,
}

impl AppConfig {
    /// Build from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] naming every unset required variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    ///
    /// Required: see [`REQUIRED_VARS`]. Blank values count as missing.
    ///
    /// Optional:
    /// - `CHAT_COLLECTION`: default `messages`
    /// - `CHAT_POLL_INTERVAL_MS`: default 1000, floor 100
    /// - inference knobs, see [`GeminiConfig::from_lookup`]
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] naming every unset required variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let present = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let missing: Vec<&'static str> = REQUIRED_VARS
            .iter()
            .copied()
            .filter(|key| present(*key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let required = |key: &str| present(key).unwrap_or_default();
        let firebase = FirebaseConfig {
            api_key: required("FIREBASE_API_KEY"),
            auth_domain: required("FIREBASE_AUTH_DOMAIN"),
            project_id: required("FIREBASE_PROJECT_ID"),
            storage_bucket: required("FIREBASE_STORAGE_BUCKET"),
            messaging_sender_id: required("FIREBASE_MESSAGING_SENDER_ID"),
            app_id: required("FIREBASE_APP_ID"),
        };

        let poll_ms = lookup("CHAT_POLL_INTERVAL_MS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_POLL_INTERVAL_MS)
            .max(MIN_POLL_INTERVAL_MS);
        let chat = ChatConfig {
            collection: present("CHAT_COLLECTION").unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            poll_interval: Duration::from_millis(poll_ms),
        };

        Ok(Self { firebase, gemini: GeminiConfig::from_lookup(&lookup), chat })
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
