use intervox_types::Role;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_token_url() -> String {
    "http://127.0.0.1:3000/api/realtime/token".to_string()
}

fn default_realtime_url() -> String {
    "https://api.openai.com/v1/realtime".to_string()
}

fn default_model() -> String {
    "gpt-4o-realtime-preview-2024-12-17".to_string()
}

fn default_data_channel_label() -> String {
    "oai-events".to_string()
}

fn default_kickoff_delay_ms() -> u64 {
    500
}

fn default_agent_role() -> Role {
    Role::Candidate
}

fn enabled() -> bool {
    true
}

/// Microphone processing requested from the capture device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioConstraints {
    #[serde(default = "enabled")]
    pub echo_cancellation: bool,
    #[serde(default = "enabled")]
    pub noise_suppression: bool,
    #[serde(default = "enabled")]
    pub auto_gain_control: bool,
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// Settings for the voice-agent session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Trust-boundary endpoint that exchanges interview context for a
    /// short-lived credential.
    #[serde(default = "default_token_url")]
    pub token_url: String,
    /// Voice-agent provider endpoint that accepts the SDP offer.
    #[serde(default = "default_realtime_url")]
    pub realtime_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Label of the data channel carrying protocol events.
    #[serde(default = "default_data_channel_label")]
    pub data_channel_label: String,
    /// Delay between the channel opening and the initial `response.create`.
    #[serde(default = "default_kickoff_delay_ms")]
    pub kickoff_delay_ms: u64,
    /// The transcript role the agent speaks as. The human on the other end of
    /// the voice session gets the opposite role.
    #[serde(default = "default_agent_role")]
    pub agent_role: Role,
    #[serde(default)]
    pub audio: AudioConstraints,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            token_url: default_token_url(),
            realtime_url: default_realtime_url(),
            model: default_model(),
            data_channel_label: default_data_channel_label(),
            kickoff_delay_ms: default_kickoff_delay_ms(),
            agent_role: default_agent_role(),
            audio: AudioConstraints::default(),
        }
    }
}

impl RealtimeConfig {
    pub fn kickoff_delay(&self) -> Duration {
        Duration::from_millis(self.kickoff_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_all_audio_processing() {
        let config = RealtimeConfig::default();
        assert!(config.audio.echo_cancellation);
        assert!(config.audio.noise_suppression);
        assert!(config.audio.auto_gain_control);
        assert_eq!(config.kickoff_delay(), Duration::from_millis(500));
        assert_eq!(config.agent_role, Role::Candidate);
    }

    #[test]
    fn toml_overrides_keep_remaining_defaults() {
        let config: RealtimeConfig = toml::from_str(
            r#"
            agent_role = "interviewer"
            kickoff_delay_ms = 0

            [audio]
            auto_gain_control = false
            "#,
        )
        .unwrap();
        assert_eq!(config.agent_role, Role::Interviewer);
        assert_eq!(config.kickoff_delay(), Duration::ZERO);
        assert!(!config.audio.auto_gain_control);
        assert!(config.audio.echo_cancellation);
        assert_eq!(config.data_channel_label, "oai-events");
    }
}
