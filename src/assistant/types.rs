//! Inference types — provider-neutral trait and errors.

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by inference client operations.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    /// No API credential is configured; no request was made.
    #[error("inference credential not configured")]
    MissingCredential,

    /// The HTTP request to the provider failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// The provider returned a non-success HTTP status.
    #[error("API response error: status {status}: {message}")]
    ApiResponse { status: u16, message: String },

    /// The provider response body could not be deserialized.
    #[error("API response parse failed: {0}")]
    ApiParse(String),

    /// The provider answered but produced no candidate text.
    #[error("API returned no candidates")]
    NoCandidate,

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl crate::error::ErrorCode for InferenceError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingCredential => "E_MISSING_API_KEY",
            Self::ApiRequest(_) => "E_API_REQUEST",
            Self::ApiResponse { .. } => "E_API_RESPONSE",
            Self::ApiParse(_) => "E_API_PARSE",
            Self::NoCandidate => "E_NO_CANDIDATE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::ApiRequest(_) | Self::ApiResponse { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// INFERENCE TRAIT
// =============================================================================

/// Provider-neutral async trait for single-prompt text generation. Enables
/// mocking in tests.
#[async_trait::async_trait]
pub trait Inference: Send + Sync {
    /// Whether a credential is configured. Callers check this before
    /// spending a request.
    fn has_credential(&self) -> bool;

    /// Send one prompt and return the generated text.
    ///
    /// # Errors
    ///
    /// Returns an [`InferenceError`] if the credential is absent, the
    /// request fails, or the response has no candidate text.
    async fn generate(&self, prompt: &str) -> Result<String, InferenceError>;
}
