//! Inference configuration parsed from environment variables.

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

pub const GEMINI_API_KEY_VAR: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferenceTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiConfig {
    /// `None` means the assistant answers with the not-configured text.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeouts: InferenceTimeouts,
}

impl GeminiConfig {
    /// Build from a key lookup (normally the process environment).
    ///
    /// - `GEMINI_API_KEY`: credential; blank is treated as absent
    /// - `GEMINI_MODEL`: default `gemini-2.0-flash`
    /// - `GEMINI_BASE_URL`: default public endpoint
    /// - `INFERENCE_REQUEST_TIMEOUT_SECS`: default 60
    /// - `INFERENCE_CONNECT_TIMEOUT_SECS`: default 10
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let api_key = lookup(GEMINI_API_KEY_VAR).filter(|v| !v.trim().is_empty());
        let model = lookup("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());
        let base_url = lookup("GEMINI_BASE_URL")
            .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let timeouts = InferenceTimeouts {
            request_secs: parse_u64(&lookup, "INFERENCE_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: parse_u64(&lookup, "INFERENCE_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        Self { api_key, model, base_url, timeouts }
    }
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> u64 {
    lookup(key)
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}
