//! Streaming text-generation provider abstraction.
//!
//! One trait, one event type. The continuation streamer only ever sees
//! [`StreamEvent`]s coming out of a channel, so providers and test doubles
//! are interchangeable.

pub mod error;
pub mod gemini;

use std::sync::mpsc::Sender;

pub use error::LlmError;

/// A single-prompt generation request, constructed fresh per pass.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
}

/// Events emitted by a provider during one streaming session.
#[derive(Debug)]
pub enum StreamEvent {
    /// Raw text fragment as received from the endpoint. Not guaranteed to
    /// be a clean delta: it may resend text the session already produced.
    Fragment(String),
    /// Session ended. `final_text` is the provider's authoritative view of
    /// the full response when it has one; it may disagree with the
    /// fragment stream.
    Done { final_text: Option<String> },
    /// Transport or API failure mid-session.
    Error(LlmError),
}

/// Trait for streaming text-generation providers.
pub trait LlmClient: Send + Sync {
    /// Run one streaming session, pushing events into `tx`.
    ///
    /// Implementations must verify their credential before any network
    /// call, and stop reading the session once the receiver hangs up.
    fn stream(&self, request: &GenerationRequest, tx: Sender<StreamEvent>) -> Result<(), LlmError>;
}
