//! Streaming completion client.
//!
//! One blocking worker thread per request: the OpenAI-compatible SSE
//! response is read line by line and content deltas are forwarded over an
//! mpsc channel. Cancellation is a shared flag checked at every line
//! boundary, and ends the stream with a distinct outcome rather than an
//! error.

pub mod error;
mod openai;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread;

use serde::Serialize;

use crate::provider::ProviderConfig;
use self::error::StreamError;

/// Chat message in the wire format.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: String) -> Self {
        Self { role: "system".to_string(), content }
    }

    pub fn user(content: String) -> Self {
        Self { role: "user".to_string(), content }
    }
}

/// Events emitted while a completion streams.
#[derive(Debug)]
pub enum StreamEvent {
    /// The HTTP response passed the status check; the stream is open.
    /// Emitted once, before any fragment.
    Accepted,
    /// One content delta from the response.
    Chunk(String),
    /// Stream finished normally.
    Done,
    /// Stream ended because the cancel flag was raised.
    Cancelled,
    /// Stream failed.
    Error(StreamError),
}

/// How a stream ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    Completed,
    Cancelled,
}

/// Cooperative cancellation handle shared between the rewrite controller
/// and the stream worker.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Start a completion stream on a worker thread.
///
/// The worker writes `Accepted` once the response passes the status check,
/// then `Chunk` events, then exactly one terminal event (`Done`,
/// `Cancelled`, or `Error`), and exits.
pub fn spawn_completion_stream(
    config: ProviderConfig,
    messages: Vec<ChatMessage>,
    current_code: String,
    cancel: CancelFlag,
    tx: Sender<StreamEvent>,
) {
    thread::spawn(move || {
        let event = match openai::stream_completion(&config, messages, &current_code, &cancel, &tx) {
            Ok(StreamEnd::Completed) => StreamEvent::Done,
            Ok(StreamEnd::Cancelled) => StreamEvent::Cancelled,
            Err(e) => StreamEvent::Error(e),
        };
        let _ = tx.send(event);
    });
}
