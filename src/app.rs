//! Terminal chat loop.
//!
//! ARCHITECTURE
//! ============
//! One task drives the UI. It `select!`s over four sources:
//!
//! - stdin lines: plain text is sent, `/` commands act locally
//! - the controller's `ViewStream`: each snapshot redraws the conversation
//! - send results: appends run in order on a spawned worker and report
//!   back with the text they tried to send
//! - assistant results: requests run as spawned tasks and report back over
//!   an mpsc channel tagged with their `RequestTicket`
//!
//! The loop never awaits a network call inline, so the conversation keeps
//! updating while an append or a summary is in flight. A failed send keeps
//! its text as pending input for `/retry`.

use std::io::Write;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::assistant::{Assistant, AssistantAction, AssistantPanel, RequestTicket};
use crate::controller::{SendError, SyncController, SyncEvent, ViewStream};
use crate::session::Session;
use crate::ui::{self, HELP_TEXT, Status};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl crate::error::ErrorCode for AppError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "E_APP_IO",
        }
    }
}

// =============================================================================
// INPUT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Blank,
    Message(String),
    Summarize,
    Suggest,
    Dismiss,
    Retry,
    Help,
    Quit,
    Unknown(String),
}

/// Classify one line of user input.
#[must_use]
pub fn parse_input(line: &str) -> Input {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Input::Blank;
    }
    let Some(command) = trimmed.strip_prefix('/') else {
        return Input::Message(line.trim_end_matches(['\r', '\n']).to_string());
    };
    match command.split_whitespace().next().unwrap_or_default() {
        "summarize" | "summary" => Input::Summarize,
        "suggest" | "reply" => Input::Suggest,
        "dismiss" => Input::Dismiss,
        "retry" => Input::Retry,
        "help" | "?" => Input::Help,
        "quit" | "exit" => Input::Quit,
        other => Input::Unknown(other.to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

type AssistantResult = (RequestTicket, String);
type SendResult = (String, Result<String, SendError>);

// =============================================================================
// APP
// =============================================================================

pub struct App<W: Write> {
    controller: Arc<SyncController>,
    session: Session,
    assistant: Arc<Assistant>,
    panel: AssistantPanel,
    pending_input: Option<String>,
    live: bool,
    results_tx: mpsc::UnboundedSender<AssistantResult>,
    results_rx: mpsc::UnboundedReceiver<AssistantResult>,
    sends_tx: mpsc::UnboundedSender<SendResult>,
    sends_rx: mpsc::UnboundedReceiver<SendResult>,
    /// Queue feeding the send worker; started on first use.
    outbox: Option<mpsc::UnboundedSender<String>>,
    out: W,
}

impl<W: Write> App<W> {
    #[must_use]
    pub fn new(controller: Arc<SyncController>, session: Session, assistant: Arc<Assistant>, out: W) -> Self {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let (sends_tx, sends_rx) = mpsc::unbounded_channel();
        Self {
            controller,
            session,
            assistant,
            panel: AssistantPanel::new(),
            pending_input: None,
            live: false,
            results_tx,
            results_rx,
            sends_tx,
            sends_rx,
            outbox: None,
            out,
        }
    }

    /// Run until `/quit` or end of input. `stream` is `None` when the
    /// session could not be established.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] if writing to the terminal or reading input
    /// fails.
    pub async fn run<R>(mut self, input: R, mut stream: Option<ViewStream>) -> Result<(), AppError>
    where
        R: AsyncBufRead + Unpin,
    {
        self.live = stream.is_some();
        writeln!(self.out, "{HELP_TEXT}")?;
        self.write_status()?;

        let mut lines = input.lines();
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        debug!("app: input closed");
                        break;
                    };
                    if self.handle_line(&line)? == Flow::Quit {
                        break;
                    }
                }
                event = next_sync_event(&mut stream) => match event {
                    Some(event) => self.handle_sync_event(event)?,
                    None => {
                        stream = None;
                        self.live = false;
                        writeln!(self.out, "! live updates stopped")?;
                        self.write_status()?;
                    }
                },
                Some((text, result)) = self.sends_rx.recv() => {
                    self.handle_send_result(text, result)?;
                }
                Some((ticket, text)) = self.results_rx.recv() => {
                    self.handle_assistant_result(ticket, text)?;
                }
            }
        }

        self.controller.close();
        info!("app: exiting");
        Ok(())
    }

    /// React to one line of input.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] if the terminal write fails.
    pub fn handle_line(&mut self, line: &str) -> Result<Flow, AppError> {
        match parse_input(line) {
            Input::Blank => {}
            Input::Message(text) => self.send(text),
            Input::Retry => match self.pending_input.take() {
                Some(text) => self.send(text),
                None => writeln!(self.out, "nothing to retry")?,
            },
            Input::Summarize => self.request_assistant(AssistantAction::Summarize)?,
            Input::Suggest => self.request_assistant(AssistantAction::SuggestReply)?,
            Input::Dismiss => self.panel.dismiss(),
            Input::Help => writeln!(self.out, "{HELP_TEXT}")?,
            Input::Quit => return Ok(Flow::Quit),
            Input::Unknown(name) => writeln!(self.out, "unknown command /{name}; type /help")?,
        }
        Ok(Flow::Continue)
    }

    /// Redraw on a snapshot; report an error and keep the last view.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] if the terminal write fails.
    pub fn handle_sync_event(&mut self, event: SyncEvent) -> Result<(), AppError> {
        match event {
            SyncEvent::Snapshot(view) => {
                writeln!(self.out, "{}", ui::render_view(&view, self.session.uid()))?;
                if let Some(panel) = ui::render_assistant_panel(&self.panel) {
                    writeln!(self.out, "{panel}")?;
                }
                self.write_status()
            }
            SyncEvent::Error(e) => {
                writeln!(self.out, "{}", ui::render_error("live update failed", &e))?;
                Ok(())
            }
        }
    }

    /// Show an assistant answer unless it was superseded.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] if the terminal write fails.
    pub fn handle_assistant_result(&mut self, ticket: RequestTicket, text: String) -> Result<(), AppError> {
        if !self.panel.complete(ticket, text) {
            debug!(action = ?ticket.action, "app: discarding superseded assistant answer");
            return Ok(());
        }
        if let Some(panel) = ui::render_assistant_panel(&self.panel) {
            writeln!(self.out, "{panel}")?;
        }
        Ok(())
    }

    /// Record the outcome of a spawned send. A failure keeps the text as
    /// pending input; a success clears it if it was the pending text.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] if the terminal write fails.
    pub fn handle_send_result(&mut self, text: String, result: Result<String, SendError>) -> Result<(), AppError> {
        match result {
            Ok(_) => {
                if self.pending_input.as_deref() == Some(text.as_str()) {
                    self.pending_input = None;
                    self.write_status()?;
                }
                Ok(())
            }
            Err(SendError::EmptyText) => Ok(()),
            Err(e) => {
                writeln!(self.out, "{}", ui::render_error("send failed", &e))?;
                self.pending_input = Some(text);
                self.write_status()
            }
        }
    }

    /// Queue `text` for the send worker. Sends complete in the order typed.
    fn send(&mut self, text: String) {
        let outbox = self.outbox.get_or_insert_with(|| {
            spawn_send_worker(Arc::clone(&self.controller), self.session.clone(), self.sends_tx.clone())
        });
        if let Err(mpsc::error::SendError(text)) = outbox.send(text) {
            let _ = self.sends_tx.send((text, Err(SendError::NotConnected)));
        }
    }

    fn request_assistant(&mut self, action: AssistantAction) -> Result<(), AppError> {
        let ticket = self.panel.begin(action);
        let messages = self.controller.view().messages().to_vec();
        let assistant = Arc::clone(&self.assistant);
        let tx = self.results_tx.clone();
        tokio::spawn(async move {
            let text = assistant.run(action, &messages).await;
            let _ = tx.send((ticket, text));
        });

        if let Some(panel) = ui::render_assistant_panel(&self.panel) {
            writeln!(self.out, "{panel}")?;
        }
        Ok(())
    }

    fn write_status(&mut self) -> Result<(), AppError> {
        let status = Status {
            uid: self.session.uid(),
            live: self.live,
            pending_input: self.pending_input.as_deref(),
        };
        writeln!(self.out, "{}", ui::render_status(&status))?;
        self.out.flush()?;
        Ok(())
    }
}

fn spawn_send_worker(
    controller: Arc<SyncController>,
    session: Session,
    results: mpsc::UnboundedSender<SendResult>,
) -> mpsc::UnboundedSender<String> {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            let result = controller.send(&session, &text).await;
            let _ = results.send((text, result));
        }
        debug!("app: send worker stopped");
    });
    tx
}

async fn next_sync_event(stream: &mut Option<ViewStream>) -> Option<SyncEvent> {
    match stream {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "app_test.rs"]
mod tests;
