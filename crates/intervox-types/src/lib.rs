//! Shared types for the Intervox interview platform.
//!
//! This crate provides the domain types used across all Intervox crates:
//! transcript roles and entries, coaching suggestions, the voice session
//! state machine's states, and the identifiers the conflict arbiter uses to
//! tell real-time call engines apart.
//!
//! No crate in the workspace depends on anything *except* `intervox-types`
//! for cross-cutting type definitions.

use serde::{Deserialize, Serialize};

pub mod coach;
pub mod transcript;

pub use coach::{AnswerQuality, CoachSuggestion, SuggestionRequest};
pub use transcript::{Role, TranscriptEntry};

/// Life cycle states of a voice-agent session.
///
/// ```text
/// Idle → Requesting → Negotiating → Active → Stopping → Idle
///            └────────────┴────────────┴──→ Errored
/// ```
///
/// The state is the single source of truth for re-entrancy: activation is
/// rejected while a session is `Requesting`, `Negotiating` or `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session exists.
    #[default]
    Idle,
    /// Waiting for the short-lived credential.
    Requesting,
    /// Building the peer connection and exchanging offer/answer.
    Negotiating,
    /// Media and event channel are live.
    Active,
    /// Teardown in progress.
    Stopping,
    /// A terminal error occurred; `stop()` or a fresh activation is required.
    Errored,
}

impl SessionState {
    /// Returns the string label for this state.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Requesting => "requesting",
            Self::Negotiating => "negotiating",
            Self::Active => "active",
            Self::Stopping => "stopping",
            Self::Errored => "errored",
        }
    }

    /// Whether a session is starting or running in this state.
    ///
    /// Activation requests arriving in a live state are ignored.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Requesting | Self::Negotiating | Self::Active)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application context exchanged for a voice-agent credential.
///
/// The agent plays the candidate described here.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InterviewContext {
    #[serde(default)]
    pub candidate_name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub resume: String,
    #[serde(default)]
    pub job_description: String,
}

impl InterviewContext {
    pub fn new(candidate_name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            candidate_name: candidate_name.into(),
            role: role.into(),
            ..Default::default()
        }
    }

    /// A context is usable once it names the candidate.
    pub fn is_complete(&self) -> bool {
        !self.candidate_name.trim().is_empty()
    }
}

/// The kind of real-time session competing for call resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    /// The human-to-human video call.
    HumanVideo,
    /// The synthetic voice participant.
    VoiceAgent,
}

impl SessionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HumanVideo => "human_video",
            Self::VoiceAgent => "voice_agent",
        }
    }
}

impl std::fmt::Display for SessionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Families of real-time call engines.
///
/// Two sessions built on the same family would instantiate the same
/// underlying engine and collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineFamily {
    /// A hosted SFU call engine (the video conferencing SDK).
    HostedCall,
    /// A bare peer connection with a data channel, no call engine.
    PeerConnection,
    /// Any other engine, identified by name.
    Other(String),
}

impl std::fmt::Display for EngineFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HostedCall => f.write_str("hosted_call"),
            Self::PeerConnection => f.write_str("peer_connection"),
            Self::Other(name) => write!(f, "other:{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_states() {
        assert!(SessionState::Requesting.is_live());
        assert!(SessionState::Negotiating.is_live());
        assert!(SessionState::Active.is_live());
        assert!(!SessionState::Idle.is_live());
        assert!(!SessionState::Stopping.is_live());
        assert!(!SessionState::Errored.is_live());
    }

    #[test]
    fn session_state_serializes_snake_case() {
        let json = serde_json::to_string(&SessionState::Negotiating).unwrap();
        assert_eq!(json, "\"negotiating\"");
        assert_eq!(SessionState::Errored.to_string(), "errored");
    }

    #[test]
    fn context_requires_candidate_name() {
        assert!(!InterviewContext::default().is_complete());
        assert!(!InterviewContext::new("   ", "Engineer").is_complete());
        assert!(InterviewContext::new("Ada", "Engineer").is_complete());
    }

    #[test]
    fn engine_family_display() {
        assert_eq!(EngineFamily::HostedCall.to_string(), "hosted_call");
        assert_eq!(
            EngineFamily::Other("sip".to_string()).to_string(),
            "other:sip"
        );
    }
}
