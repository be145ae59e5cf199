use std::fmt;

/// Typed error for streaming generation.
///
/// Distinguishes the failure categories the caller cares about: a missing
/// credential (detected before any network call), transport problems, API
/// rejections, stream reads, and response parsing.
#[derive(Debug)]
pub enum LlmError {
    /// Missing or invalid API key
    Auth(String),
    /// Network-level failure (DNS, connection, timeout)
    Network(String),
    /// API returned a non-success HTTP status
    Api { status: u16, body: String },
    /// Error reading from the SSE stream
    StreamRead(String),
    /// Failed to parse response JSON
    Parse(String),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::Auth(msg) => write!(f, "Auth error: {}", msg),
            LlmError::Network(msg) => write!(f, "Network error: {}", msg),
            LlmError::Api { status, body } => write!(f, "API error {}: {}", status, body),
            LlmError::StreamRead(msg) => write!(f, "Stream read error: {}", msg),
            LlmError::Parse(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for LlmError {}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        LlmError::Network(e.to_string())
    }
}
