use std::fmt;

/// Typed error for streaming completion calls.
///
/// Cancellation is deliberately not a variant: the stream reports it as a
/// first-class outcome ([`super::StreamEnd::Cancelled`]) so callers can tell
/// "user cancelled" apart from an actual failure.
#[derive(Debug)]
pub enum StreamError {
    /// Provider configuration is unusable (missing secret key).
    Config(String),
    /// Network-level failure (DNS, connection, timeout).
    Network(String),
    /// API returned a non-success HTTP status.
    Api { status: u16, body: String },
    /// Response carried no event stream at all.
    Protocol(String),
    /// Error reading from the SSE stream.
    StreamRead(String),
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Config(msg) => write!(f, "Configuration error: {}", msg),
            StreamError::Network(msg) => write!(f, "Network error: {}", msg),
            StreamError::Api { status, body } => write!(f, "API error {}: {}", status, body),
            StreamError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            StreamError::StreamRead(msg) => write!(f, "Stream read error: {}", msg),
        }
    }
}

impl std::error::Error for StreamError {}

impl From<reqwest::Error> for StreamError {
    fn from(e: reqwest::Error) -> Self {
        StreamError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_api() {
        let e = StreamError::Api { status: 429, body: "rate limited".into() };
        assert_eq!(e.to_string(), "API error 429: rate limited");
    }

    #[test]
    fn display_config() {
        let e = StreamError::Config("API key not set".into());
        assert_eq!(e.to_string(), "Configuration error: API key not set");
    }

    #[test]
    fn display_protocol() {
        let e = StreamError::Protocol("empty response body".into());
        assert_eq!(e.to_string(), "Protocol error: empty response body");
    }
}
