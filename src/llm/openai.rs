//! OpenAI-compatible chat-completions request and SSE decoding.

use std::io::{BufRead, BufReader};
use std::sync::mpsc::Sender;

use reqwest::blocking::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::StreamError;
use super::{CancelFlag, ChatMessage, StreamEnd, StreamEvent};
use crate::constants::{SYSTEM_PROMPT, current_code_context};
use crate::provider::ProviderConfig;

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

/// Parsed SSE streaming frame (OpenAI-compatible format).
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

/// Outcome of decoding one line of the event stream.
#[derive(Debug)]
enum SseLine {
    /// Valid frame with a payload.
    Frame(StreamResponse),
    /// `data: [DONE]` terminator.
    Done,
    /// Blank line, non-`data:` line, or undecodable frame.
    Skip,
}

/// Decode one complete line. A bad frame is logged and skipped; it must not
/// abort the stream.
fn parse_sse_line(line: &str) -> SseLine {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return SseLine::Skip;
    }
    let Some(payload) = trimmed.strip_prefix("data:") else {
        debug!(line = trimmed, "ignoring non-data SSE line");
        return SseLine::Skip;
    };
    let payload = payload.trim_start();
    if payload == "[DONE]" {
        return SseLine::Done;
    }
    match serde_json::from_str::<StreamResponse>(payload) {
        Ok(frame) => SseLine::Frame(frame),
        Err(e) => {
            warn!(error = %e, "skipping malformed SSE frame");
            SseLine::Skip
        }
    }
}

/// Run one streaming completion to its end, forwarding content deltas.
///
/// The current document text is injected as additional system context so the
/// model edits in place rather than starting from nothing. Returns how the
/// stream ended, or the error that stopped it; a receiver that has gone away
/// counts as cancellation.
pub(super) fn stream_completion(
    config: &ProviderConfig,
    messages: Vec<ChatMessage>,
    current_code: &str,
    cancel: &CancelFlag,
    tx: &Sender<StreamEvent>,
) -> Result<StreamEnd, StreamError> {
    if !config.has_api_key() {
        return Err(StreamError::Config("API key not set".into()));
    }

    let mut api_messages = vec![
        ChatMessage::system(SYSTEM_PROMPT.to_string()),
        ChatMessage::system(current_code_context(current_code)),
    ];
    api_messages.extend(messages);

    let request = CompletionRequest { model: config.model().to_string(), messages: api_messages, stream: true };

    // No client timeout: the stream stays open as long as the model writes.
    let client = Client::builder().timeout(None).build()?;
    let url = config.completions_url();
    debug!(%url, model = config.model(), "starting completion stream");

    let response = client
        .post(&url)
        .header("Authorization", format!("Bearer {}", config.api_key().expose_secret()))
        .header("Content-Type", "application/json")
        .json(&request)
        .send()?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().unwrap_or_default();
        return Err(StreamError::Api { status, body });
    }

    if tx.send(StreamEvent::Accepted).is_err() {
        return Ok(StreamEnd::Cancelled);
    }

    // `lines()` buffers partially received lines across read boundaries; a
    // line is only handed over once it is complete.
    let reader = BufReader::new(response);
    let mut saw_line = false;

    for line in reader.lines() {
        if cancel.is_cancelled() {
            debug!("completion stream cancelled");
            return Ok(StreamEnd::Cancelled);
        }

        let line = match line {
            Ok(line) => line,
            // An aborted connection right after cancellation is the
            // cancellation, not a failure.
            Err(_) if cancel.is_cancelled() => return Ok(StreamEnd::Cancelled),
            Err(e) => return Err(StreamError::StreamRead(e.to_string())),
        };
        saw_line = true;

        match parse_sse_line(&line) {
            SseLine::Done => return Ok(StreamEnd::Completed),
            SseLine::Skip => {}
            SseLine::Frame(frame) => {
                for choice in frame.choices {
                    let Some(content) = choice.delta.and_then(|d| d.content) else { continue };
                    if content.is_empty() {
                        continue;
                    }
                    if tx.send(StreamEvent::Chunk(content)).is_err() {
                        return Ok(StreamEnd::Cancelled);
                    }
                }
            }
        }
    }

    if !saw_line {
        return Err(StreamError::Protocol("response carried no event stream".into()));
    }
    // Some providers close the connection without a [DONE] frame.
    Ok(StreamEnd::Completed)
}
