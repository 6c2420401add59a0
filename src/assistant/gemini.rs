//! Gemini `generateContent` client.
//!
//! Thin HTTP wrapper for `/models/{model}:generateContent`. Pure parsing in
//! `parse_response` for testability. A client without a credential never
//! touches the network.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use super::config::GeminiConfig;
use super::types::{Inference, InferenceError};

// =============================================================================
// CLIENT
// =============================================================================

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl GeminiClient {
    /// # Errors
    ///
    /// Returns [`InferenceError::HttpClientBuild`] if the HTTP client cannot
    /// be built.
    pub fn new(config: GeminiConfig) -> Result<Self, InferenceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| InferenceError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, api_key: config.api_key, model: config.model, base_url: config.base_url })
    }

    /// Return the configured model name (e.g. `"gemini-2.0-flash"`).
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait::async_trait]
impl Inference for GeminiClient {
    fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(&self, prompt: &str) -> Result<String, InferenceError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(InferenceError::MissingCredential);
        };

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = ApiRequest::single_prompt(prompt);

        let response = self
            .http
            .post(url)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| InferenceError::ApiRequest(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| InferenceError::ApiRequest(e.to_string()))?;

        if status != 200 {
            let message = parse_error_message(&text).unwrap_or(text);
            return Err(InferenceError::ApiResponse { status, message });
        }

        parse_response(&text)
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
pub(crate) struct ApiRequest<'a> {
    contents: [ApiContent<'a>; 1],
}

#[derive(Serialize)]
struct ApiContent<'a> {
    parts: [ApiPart<'a>; 1],
}

#[derive(Serialize)]
struct ApiPart<'a> {
    text: &'a str,
}

impl<'a> ApiRequest<'a> {
    pub(crate) fn single_prompt(prompt: &'a str) -> Self {
        Self { contents: [ApiContent { parts: [ApiPart { text: prompt }] }] }
    }
}

// =============================================================================
// PARSING
// =============================================================================

pub(crate) fn parse_response(json_text: &str) -> Result<String, InferenceError> {
    let root: Value = serde_json::from_str(json_text).map_err(|e| InferenceError::ApiParse(e.to_string()))?;

    if let Some(message) = error_message(&root) {
        return Err(InferenceError::ApiResponse { status: 200, message });
    }

    let Some(candidate) = root
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
    else {
        return Err(InferenceError::NoCandidate);
    };

    let text: String = candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(InferenceError::NoCandidate);
    }
    Ok(text)
}

pub(crate) fn parse_error_message(json_text: &str) -> Option<String> {
    let root: Value = serde_json::from_str(json_text).ok()?;
    error_message(&root)
}

fn error_message(root: &Value) -> Option<String> {
    root.get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map(str::to_owned)
}

#[cfg(test)]
#[path = "gemini_test.rs"]
mod tests;
