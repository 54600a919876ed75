use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_suggest_url() -> String {
    "http://127.0.0.1:3000/api/coach/suggest".to_string()
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_history_capacity() -> usize {
    50
}

fn default_interviewer_label() -> String {
    "Interviewer".to_string()
}

fn default_candidate_label() -> String {
    "Candidate".to_string()
}

/// Settings for the live coaching assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoachConfig {
    /// Suggestion-retrieval endpoint.
    #[serde(default = "default_suggest_url")]
    pub suggest_url: String,
    /// Quiet period after the last transcript change before retrieving.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Maximum number of suggestions kept; the oldest is evicted first.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    #[serde(default = "default_interviewer_label")]
    pub interviewer_label: String,
    #[serde(default = "default_candidate_label")]
    pub candidate_label: String,
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            suggest_url: default_suggest_url(),
            debounce_ms: default_debounce_ms(),
            history_capacity: default_history_capacity(),
            interviewer_label: default_interviewer_label(),
            candidate_label: default_candidate_label(),
        }
    }
}

impl CoachConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_section_keeps_defaults() {
        let config: CoachConfig = toml::from_str("debounce_ms = 250").unwrap();
        assert_eq!(config.debounce(), Duration::from_millis(250));
        assert_eq!(config.history_capacity, 50);
        assert_eq!(config.candidate_label, "Candidate");
    }
}
