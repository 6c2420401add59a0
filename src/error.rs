//! Error codes shared by every fallible module.
//!
//! Each module owns its own `thiserror` enum. They all implement
//! [`ErrorCode`] so the terminal UI can show a grepable code next to the
//! human-readable message, and so callers can decide whether a manual retry
//! is worth offering.

/// Grepable error code and retryable flag for user-facing error lines.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

/// Render an error as `[E_CODE] message`.
#[must_use]
pub fn describe(err: &dyn ErrorCode) -> String {
    format!("[{}] {err}", err.error_code())
}
