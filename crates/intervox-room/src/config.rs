//! Client configuration loading from file and environment variables.

use intervox_coach::CoachConfig;
use intervox_voice::RealtimeConfig;
use serde::Deserialize;
use thiserror::Error;

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientConfig {
    /// Voice-agent session settings.
    #[serde(default)]
    pub voice: RealtimeConfig,

    /// Coaching assistant settings.
    #[serde(default)]
    pub coach: CoachConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "intervox_voice=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `INTERVOX_TOKEN_URL` overrides `voice.token_url`
/// - `INTERVOX_REALTIME_URL` overrides `voice.realtime_url`
/// - `INTERVOX_REALTIME_MODEL` overrides `voice.model`
/// - `INTERVOX_SUGGEST_URL` overrides `coach.suggest_url`
/// - `INTERVOX_LOG_LEVEL` overrides `logging.level`
/// - `INTERVOX_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<ClientConfig, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                ClientConfig::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => ClientConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Applies `INTERVOX_*` overrides read through `lookup`.
pub fn apply_env_overrides(config: &mut ClientConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup("INTERVOX_TOKEN_URL") {
        config.voice.token_url = url;
    }
    if let Some(url) = lookup("INTERVOX_REALTIME_URL") {
        config.voice.realtime_url = url;
    }
    if let Some(model) = lookup("INTERVOX_REALTIME_MODEL") {
        config.voice.model = model;
    }
    if let Some(url) = lookup("INTERVOX_SUGGEST_URL") {
        config.coach.suggest_url = url;
    }
    if let Some(level) = lookup("INTERVOX_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = lookup("INTERVOX_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = load_config(path.to_str()).unwrap();
        assert_eq!(config.voice.kickoff_delay_ms, 500);
        assert_eq!(config.coach.history_capacity, 50);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn file_sections_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[voice]
model = "gpt-4o-mini-realtime-preview"
kickoff_delay_ms = 750

[voice.audio]
noise_suppression = false

[coach]
debounce_ms = 300
interviewer_label = "Host"

[logging]
level = "debug"
json = true
"#
        )
        .unwrap();

        let config = load_config(file.path().to_str()).unwrap();
        assert_eq!(config.voice.model, "gpt-4o-mini-realtime-preview");
        assert_eq!(config.voice.kickoff_delay_ms, 750);
        assert!(!config.voice.audio.noise_suppression);
        assert!(config.voice.audio.echo_cancellation);
        assert_eq!(config.voice.data_channel_label, "oai-events");
        assert_eq!(config.coach.debounce_ms, 300);
        assert_eq!(config.coach.interviewer_label, "Host");
        assert_eq!(config.coach.candidate_label, "Candidate");
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[voice\nmodel = ").unwrap();
        let err = load_config(file.path().to_str()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn environment_overrides_file_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("INTERVOX_TOKEN_URL", "https://app.example/api/realtime/token"),
            ("INTERVOX_SUGGEST_URL", "https://app.example/api/coach/suggest"),
            ("INTERVOX_LOG_JSON", "1"),
        ]);
        let mut config = ClientConfig::default();
        apply_env_overrides(&mut config, |key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.voice.token_url, "https://app.example/api/realtime/token");
        assert_eq!(config.coach.suggest_url, "https://app.example/api/coach/suggest");
        assert!(config.logging.json);
        assert_eq!(config.voice.model, RealtimeConfig::default().model);
    }
}
