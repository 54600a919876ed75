//! Transcript roles and entries.
//!
//! Both transcript sources (the human video call and the voice agent) produce
//! `TranscriptEntry` values. They are merged into one logical stream and
//! rendered as `"<Label>: <content>"` lines for exchange detection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The speaker role of a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Interviewer,
    Candidate,
}

impl Role {
    /// Returns the display label used when rendering transcript lines.
    pub fn label(self) -> &'static str {
        match self {
            Self::Interviewer => "Interviewer",
            Self::Candidate => "Candidate",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A single utterance in the interview transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub content: String,
    /// Advisory only; entries from different sources are not globally ordered.
    pub timestamp: DateTime<Utc>,
}

impl TranscriptEntry {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Renders the entry as a single transcript line.
    ///
    /// Embedded line breaks are folded into spaces so one entry is always one
    /// line.
    pub fn to_line(&self) -> String {
        let content = self
            .content
            .split(['\r', '\n'])
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        format!("{}: {}", self.role.label(), content)
    }
}
