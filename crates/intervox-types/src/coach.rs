//! Coaching suggestion records.

use serde::{Deserialize, Serialize};

/// The scorer's assessment of the candidate's last answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerQuality {
    Strong,
    #[default]
    Adequate,
    Weak,
    /// The scorer returned a value this client does not know.
    #[serde(other)]
    Unknown,
}

/// A suggested follow-up produced by the external scorer for one exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoachSuggestion {
    pub suggested_next_question: String,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub answer_quality: AnswerQuality,
}

/// What the client sends to the suggestion endpoint for one exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRequest {
    pub last_exchange_text: String,
    #[serde(default)]
    pub full_transcript: String,
    /// Whole minutes since the interview started.
    #[serde(default)]
    pub elapsed_minutes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}
