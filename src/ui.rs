//! Plain-text rendering for the terminal chat.
//!
//! Every function here is pure: it turns state into the exact text the app
//! writes out, so layout is tested without a terminal.

use std::fmt::Write;

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use crate::assistant::AssistantPanel;
use crate::config::ConfigError;
use crate::error::{ErrorCode, describe};
use crate::model::{ConversationView, Message};

const TIME_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[hour]:[minute]:[second]");
const RULE: &str = "----------------------------------------";

pub const HELP_TEXT: &str = "\
Type a line and press enter to send it.
  /summarize  summarize the conversation
  /suggest    suggest a reply to the last message
  /dismiss    hide the assistant panel
  /retry      resend the last message that failed
  /help       show this help
  /quit       leave the chat";

// =============================================================================
// CONVERSATION
// =============================================================================

/// One message line: `[HH:MM:SS] author: text`. Messages written by `own_uid`
/// are marked with `(you)`.
#[must_use]
pub fn render_message(message: &Message, own_uid: Option<&str>) -> String {
    let stamp = message.created_at.format(TIME_FORMAT).unwrap_or_else(|_| "--:--:--".to_string());
    let marker = if own_uid == Some(message.author.as_str()) { " (you)" } else { "" };
    format!("[{stamp}] {}{marker}: {}", message.author_label(), message.text)
}

/// The whole conversation, redrawn from scratch.
#[must_use]
pub fn render_view(view: &ConversationView, own_uid: Option<&str>) -> String {
    let mut out = format!("{RULE}\n");
    if view.is_empty() {
        out.push_str("  (no messages yet)\n");
    }
    for message in view.messages() {
        let _ = writeln!(out, "{}", render_message(message, own_uid));
    }
    out.push_str(RULE);
    out
}

// =============================================================================
// STATUS
// =============================================================================

/// Connection and session summary shown under the conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Status<'a> {
    pub uid: Option<&'a str>,
    pub live: bool,
    pub pending_input: Option<&'a str>,
}

#[must_use]
pub fn render_status(status: &Status<'_>) -> String {
    let who = match status.uid {
        Some(uid) => format!("signed in as {}", uid.get(..6).unwrap_or(uid)),
        None => "not signed in (sending disabled)".to_string(),
    };
    let feed = if status.live { "live" } else { "offline" };
    let mut line = format!("[{who} | {feed}]");
    if let Some(pending) = status.pending_input {
        let _ = write!(line, " unsent: \"{pending}\" (/retry to resend)");
    }
    line
}

/// A user-facing error line with its code.
#[must_use]
pub fn render_error(context: &str, err: &dyn ErrorCode) -> String {
    let hint = if err.retryable() { " (try again)" } else { "" };
    format!("! {context}: {}{hint}", describe(err))
}

// =============================================================================
// ASSISTANT
// =============================================================================

/// The assistant slot, if there is anything to show.
#[must_use]
pub fn render_assistant_panel(panel: &AssistantPanel) -> Option<String> {
    if let Some(action) = panel.pending() {
        return Some(format!("assistant: {} in progress...", action.label().to_lowercase()));
    }
    let response = panel.shown()?;
    Some(format!(
        "+-- assistant: {} --\n{}\n+-- /dismiss to close --",
        response.action.label(),
        response.text
    ))
}

// =============================================================================
// CONFIGURATION ERROR
// =============================================================================

/// Static remediation screen for a startup configuration failure.
#[must_use]
pub fn render_config_error(err: &ConfigError) -> String {
    let mut out = format!("chatline cannot start: {}\n\n", describe(err));
    match err {
        ConfigError::Missing(vars) => {
            out.push_str("Set the following environment variables (or add them to a .env file):\n");
            for var in vars {
                let _ = writeln!(out, "  {var}");
            }
        }
    }
    out.push_str("\nThen run chatline again.");
    out
}

#[cfg(test)]
#[path = "ui_test.rs"]
mod tests;
