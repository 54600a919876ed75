use thiserror::Error;

/// Terminal failures of a voice session.
///
/// Every variant moves the session to `Errored` and is surfaced as
/// user-visible state; none is retried automatically. Payloads are plain
/// strings so the error can be stored and broadcast.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VoiceError {
    /// Missing or invalid credentials, context, or setup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The microphone could not be opened.
    #[error("microphone access denied: {0}")]
    MediaAccess(String),

    /// The offer/answer exchange or the peer connection failed.
    #[error("negotiation failed: {0}")]
    Negotiation(String),

    /// The remote agent reported an error frame.
    #[error("agent protocol error: {0}")]
    AgentProtocol(String),

    /// Two real-time engines collided.
    #[error("engine conflict: {0}")]
    Conflict(String),
}

impl VoiceError {
    /// Returns a stable label for logs and UI banners.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::MediaAccess(_) => "media_access",
            Self::Negotiation(_) => "negotiation",
            Self::AgentProtocol(_) => "agent_protocol",
            Self::Conflict(_) => "conflict",
        }
    }
}
