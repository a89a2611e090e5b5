//! Incremental rewrite controller: drives one AI edit of the active buffer.
//!
//! The model replies with the full updated diagram wrapped in a markdown
//! code fence. Because the fence can only be detected once enough of the
//! reply has arrived, the cleaned view is re-derived from the full
//! accumulated text on every fragment, never patched fragment by fragment.
//!
//! Cancellation and errors keep whatever the model wrote so far: a partially
//! correct rewrite is more useful than reverting to the original. The
//! pre-edit snapshot stays available to hosts that want to offer a manual
//! revert.

use std::fmt;
use std::sync::mpsc::{self, Receiver};

use tracing::debug;

use crate::constants::rewrite_instruction;
use crate::llm::{CancelFlag, ChatMessage, StreamEvent, spawn_completion_stream};
use crate::provider::ProviderConfig;
use crate::session::SessionStore;

/// Why a rewrite could not start. All checks happen synchronously, before
/// any network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteError {
    /// A rewrite session is already in flight; it is left untouched.
    AlreadyActive,
    /// Provider configuration has no secret key.
    MissingApiKey,
    /// The session has no active buffer to edit.
    NoActiveBuffer,
}

impl fmt::Display for RewriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewriteError::AlreadyActive => write!(f, "a rewrite is already in progress"),
            RewriteError::MissingApiKey => write!(f, "API key not configured"),
            RewriteError::NoActiveBuffer => write!(f, "no active buffer"),
        }
    }
}

impl std::error::Error for RewriteError {}

/// Terminal result of one rewrite session. `Cancelled` is not a failure and
/// must not produce an error notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteOutcome {
    Completed,
    Cancelled,
    Failed(String),
}

/// Live phases of a session; `None` on the controller means idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewritePhase {
    /// Request sent, response not yet accepted.
    Starting,
    /// The first byte of the HTTP response has been accepted.
    Streaming,
}

#[derive(Debug)]
struct RewriteSession {
    cancel: CancelFlag,
    /// Raw accumulated reply, fences included.
    raw: String,
    /// Active buffer content captured at start, for manual revert only.
    snapshot: String,
    phase: RewritePhase,
}

/// Owns at most one in-flight rewrite.
#[derive(Debug, Default)]
pub struct RewriteController {
    session: Option<RewriteSession>,
}

impl RewriteController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn phase(&self) -> Option<RewritePhase> {
        self.session.as_ref().map(|s| s.phase)
    }

    /// Active buffer content as it was when the current session started.
    pub fn pre_edit_snapshot(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.snapshot.as_str())
    }

    /// Begin a rewrite of the active buffer and return the event stream to
    /// pump. The worker thread sends `Chunk` events followed by exactly one
    /// terminal event.
    pub fn start(
        &mut self,
        store: &SessionStore,
        config: &ProviderConfig,
        requirement: &str,
    ) -> Result<Receiver<StreamEvent>, RewriteError> {
        if self.session.is_some() {
            return Err(RewriteError::AlreadyActive);
        }
        if !config.has_api_key() {
            return Err(RewriteError::MissingApiKey);
        }
        let Some(active) = store.active_buffer() else {
            return Err(RewriteError::NoActiveBuffer);
        };

        let snapshot = active.content.clone();
        let cancel = self.begin(snapshot.clone());
        let (tx, rx) = mpsc::channel();
        let messages = vec![ChatMessage::user(rewrite_instruction(requirement))];
        spawn_completion_stream(config.clone(), messages, snapshot, cancel, tx);
        Ok(rx)
    }

    fn begin(&mut self, snapshot: String) -> CancelFlag {
        let cancel = CancelFlag::new();
        self.session = Some(RewriteSession {
            cancel: cancel.clone(),
            raw: String::new(),
            snapshot,
            phase: RewritePhase::Starting,
        });
        cancel
    }

    /// Request cancellation of the in-flight session. Only meaningful while
    /// starting or streaming; otherwise a no-op.
    pub fn cancel(&self) {
        if let Some(session) = &self.session {
            session.cancel.cancel();
        }
    }

    /// Apply one stream event. Returns the outcome on the terminal event;
    /// the session is torn down (in-progress cleared, cancel handle
    /// discarded) as the final step of every terminal path. Events arriving
    /// after teardown are ignored.
    pub fn handle_event(&mut self, store: &mut SessionStore, event: StreamEvent) -> Option<RewriteOutcome> {
        let Some(session) = self.session.as_mut() else {
            return None;
        };

        let outcome = match event {
            StreamEvent::Accepted => {
                if session.phase == RewritePhase::Starting {
                    session.phase = RewritePhase::Streaming;
                    debug!("rewrite stream accepted");
                }
                None
            }
            StreamEvent::Chunk(text) => {
                // A fragment implies the response was accepted.
                session.phase = RewritePhase::Streaming;
                session.raw.push_str(&text);
                let cleaned = strip_fences(&session.raw);
                // Hold back until there is real content, so the buffer never
                // flashes empty before the model's first useful text.
                if !cleaned.trim().is_empty() {
                    store.update_active_content(cleaned);
                }
                None
            }
            StreamEvent::Done => Some(RewriteOutcome::Completed),
            StreamEvent::Cancelled => Some(RewriteOutcome::Cancelled),
            StreamEvent::Error(e) => Some(RewriteOutcome::Failed(e.to_string())),
        };

        if outcome.is_some() {
            self.session = None;
        }
        outcome
    }

    /// Drive the stream to completion, blocking on each fragment. A worker
    /// that disappears without a terminal event still tears the session
    /// down, so every exit path ends idle.
    pub fn pump(&mut self, store: &mut SessionStore, rx: &Receiver<StreamEvent>) -> RewriteOutcome {
        loop {
            match rx.recv() {
                Ok(event) => {
                    if let Some(outcome) = self.handle_event(store, event) {
                        return outcome;
                    }
                }
                Err(_) => {
                    self.session = None;
                    return RewriteOutcome::Failed("stream worker disconnected".into());
                }
            }
        }
    }
}

/// Strip the markdown code fence the model wraps its reply in: a leading
/// ``` with an optional language tag and at most one following newline, and
/// a trailing ``` together with surrounding whitespace. Partial text without
/// complete fences passes through untouched.
pub fn strip_fences(raw: &str) -> &str {
    let mut text = raw;

    if let Some(rest) = text.strip_prefix("```") {
        let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        let rest = rest.trim_start_matches([' ', '\t']);
        text = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n')).unwrap_or(rest);
    }

    let trimmed = text.trim_end();
    if let Some(head) = trimmed.strip_suffix("```") {
        text = head.trim_end();
    }
    text
}
