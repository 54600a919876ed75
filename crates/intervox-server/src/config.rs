//! Server configuration loading from file and environment variables.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream model provider settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// The model provider the server holds credentials for.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Long-lived provider key. Never leaves the server.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_realtime_model")]
    pub realtime_model: String,

    /// Voice the AI candidate speaks with.
    #[serde(default = "default_voice")]
    pub voice: String,

    /// Model transcribing the interviewer's speech inside the voice session.
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,

    /// Model scoring exchanges for coaching suggestions.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("realtime_model", &self.realtime_model)
            .field("voice", &self.voice)
            .field("transcription_model", &self.transcription_model)
            .field("chat_model", &self.chat_model)
            .finish()
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "intervox_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_realtime_model() -> String {
    "gpt-4o-realtime-preview-2024-12-17".to_string()
}

fn default_voice() -> String {
    "verse".to_string()
}

fn default_transcription_model() -> String {
    "whisper-1".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            realtime_model: default_realtime_model(),
            voice: default_voice(),
            transcription_model: default_transcription_model(),
            chat_model: default_chat_model(),
        }
    }
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
/// - `INTERVOX_HOST` overrides `server.host`
/// - `INTERVOX_PORT` overrides `server.port`
/// - `INTERVOX_PROVIDER_API_KEY` overrides `provider.api_key`
/// - `INTERVOX_PROVIDER_BASE_URL` overrides `provider.base_url`
/// - `INTERVOX_LOG_LEVEL` overrides `logging.level`
/// - `INTERVOX_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Applies `INTERVOX_*` overrides read through `lookup`.
pub fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(host) = lookup("INTERVOX_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = lookup("INTERVOX_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(key) = lookup("INTERVOX_PROVIDER_API_KEY") {
        if !key.trim().is_empty() {
            config.provider.api_key = Some(key);
        }
    }
    if let Some(url) = lookup("INTERVOX_PROVIDER_BASE_URL") {
        config.provider.base_url = url;
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
    use std::io::Write;

    #[test]
    fn defaults_without_file() {
        let config = load_config(Some("/nonexistent/intervox-server.toml")).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.provider.chat_model, "gpt-4o-mini");
    }

    #[test]
    fn provider_section_is_parsed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 8080

[provider]
api_key = "sk-test"
voice = "alloy"
"#
        )
        .unwrap();

        let config = load_config(file.path().to_str()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.provider.voice, "alloy");
        assert_eq!(config.provider.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn api_key_is_never_printed_or_serialized() {
        let provider = ProviderConfig {
            api_key: Some("sk-secret".to_string()),
            ..ProviderConfig::default()
        };
        assert!(!format!("{provider:?}").contains("sk-secret"));
        let json = serde_json::to_string(&provider).unwrap();
        assert!(!json.contains("sk-secret"));
        assert!(!json.contains("api_key"));
    }

    #[test]
    fn environment_overrides() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, |key| match key {
            "INTERVOX_PORT" => Some("9000".to_string()),
            "INTERVOX_HOST" => Some("not-an-ip".to_string()),
            "INTERVOX_PROVIDER_API_KEY" => Some("sk-env".to_string()),
            _ => None,
        });
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, default_host());
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-env"));
    }
}
