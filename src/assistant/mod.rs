//! Assistant — conversation summaries and reply suggestions.
//!
//! DESIGN
//! ======
//! Both actions are a single prompt to the inference endpoint with no local
//! state. They fail closed: every outcome is a user-displayable string.
//! Empty input and a missing credential short-circuit before any request;
//! transport errors and empty candidates become a fixed fallback.
//!
//! `AssistantPanel` is the one response slot the UI shows. Starting a new
//! request supersedes whatever was pending or shown, and a late answer to a
//! superseded request is discarded.

pub mod config;
pub mod gemini;
pub mod types;

use std::fmt::Write;
use std::sync::Arc;

use tracing::{info, warn};

use crate::model::Message;
use types::Inference;

pub const NO_MESSAGES_TEXT: &str = "There are no messages yet, so there is nothing for the assistant to work with.";
pub const NOT_CONFIGURED_TEXT: &str =
    "The assistant is not configured. Set GEMINI_API_KEY to enable summaries and reply suggestions.";
pub const FALLBACK_TEXT: &str = "The assistant could not produce a response right now. Please try again.";

// =============================================================================
// ACTIONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistantAction {
    Summarize,
    SuggestReply,
}

impl AssistantAction {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Summarize => "Summary",
            Self::SuggestReply => "Suggested reply",
        }
    }
}

/// Prompt asking for a summary of the whole conversation.
#[must_use]
pub fn summarize_prompt(messages: &[Message]) -> String {
    let mut prompt = String::from("Summarize the following chat conversation in a few sentences:\n\n");
    for message in messages {
        let _ = writeln!(prompt, "{}: {}", message.author_label(), message.text);
    }
    prompt
}

/// Prompt asking for a reply to a single message.
#[must_use]
pub fn suggest_reply_prompt(last: &Message) -> String {
    format!(
        "Suggest a short, friendly reply to the following chat message. Respond with the reply text only.\n\n\"{}\"",
        last.text
    )
}

// =============================================================================
// ASSISTANT
// =============================================================================

pub struct Assistant {
    inference: Arc<dyn Inference>,
}

impl Assistant {
    #[must_use]
    pub fn new(inference: Arc<dyn Inference>) -> Self {
        Self { inference }
    }

    /// Summarize `messages`. Always returns displayable text.
    pub async fn summarize(&self, messages: &[Message]) -> String {
        self.run(AssistantAction::Summarize, messages).await
    }

    /// Suggest a reply to the last of `messages`. Always returns displayable
    /// text.
    pub async fn suggest_reply(&self, messages: &[Message]) -> String {
        self.run(AssistantAction::SuggestReply, messages).await
    }

    pub async fn run(&self, action: AssistantAction, messages: &[Message]) -> String {
        let Some(last) = messages.last() else {
            return NO_MESSAGES_TEXT.to_string();
        };
        if !self.inference.has_credential() {
            return NOT_CONFIGURED_TEXT.to_string();
        }

        let prompt = match action {
            AssistantAction::Summarize => summarize_prompt(messages),
            AssistantAction::SuggestReply => suggest_reply_prompt(last),
        };

        match self.inference.generate(&prompt).await {
            Ok(text) => {
                info!(?action, prompt_len = prompt.len(), response_len = text.len(), "assistant: response received");
                text.trim().to_string()
            }
            Err(e) => {
                warn!(?action, error = %e, "assistant: request failed, using fallback");
                FALLBACK_TEXT.to_string()
            }
        }
    }
}

// =============================================================================
// RESPONSE SLOT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantResponse {
    pub action: AssistantAction,
    pub text: String,
}

/// Identifies one issued request so its answer can be matched to the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket {
    generation: u64,
    pub action: AssistantAction,
}

#[derive(Debug, Default)]
pub struct AssistantPanel {
    generation: u64,
    pending: Option<AssistantAction>,
    shown: Option<AssistantResponse>,
}

impl AssistantPanel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request, replacing whatever was pending or shown.
    pub fn begin(&mut self, action: AssistantAction) -> RequestTicket {
        self.generation += 1;
        self.pending = Some(action);
        self.shown = None;
        RequestTicket { generation: self.generation, action }
    }

    /// Show the answer for `ticket`. Returns `false` (and changes nothing)
    /// if the request was superseded or dismissed.
    pub fn complete(&mut self, ticket: RequestTicket, text: String) -> bool {
        if ticket.generation != self.generation {
            return false;
        }
        self.pending = None;
        self.shown = Some(AssistantResponse { action: ticket.action, text });
        true
    }

    /// Clear the slot. Any in-flight answer will be discarded.
    pub fn dismiss(&mut self) {
        self.generation += 1;
        self.pending = None;
        self.shown = None;
    }

    #[must_use]
    pub fn pending(&self) -> Option<AssistantAction> {
        self.pending
    }

    #[must_use]
    pub fn shown(&self) -> Option<&AssistantResponse> {
        self.shown.as_ref()
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
