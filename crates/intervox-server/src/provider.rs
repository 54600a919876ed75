//! Calls to the upstream model provider made with the server-held key.

use crate::config::ProviderConfig;
use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

/// A short-lived realtime secret as returned to the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSecret {
    pub value: String,
    #[serde(default)]
    pub expires_at: Option<i64>,
}

#[derive(Deserialize)]
struct SessionResponse {
    client_secret: ClientSecret,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP client for the provider's realtime-session and chat endpoints.
#[derive(Clone)]
pub struct ProviderClient {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl ProviderClient {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn api_key(&self) -> Result<&str, ApiError> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ApiError::ServiceUnavailable("provider API key not configured".into()))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Mints an ephemeral realtime secret for a session running
    /// `instructions`.
    pub async fn create_realtime_session(&self, instructions: &str) -> Result<ClientSecret, ApiError> {
        let key = self.api_key()?;
        let body = json!({
            "model": self.config.realtime_model,
            "voice": self.config.voice,
            "modalities": ["audio", "text"],
            "instructions": instructions,
            "input_audio_transcription": { "model": self.config.transcription_model },
        });

        let response = self
            .client
            .post(self.endpoint("realtime/sessions"))
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::BadGateway(format!("realtime session request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "provider rejected realtime session request");
            return Err(ApiError::BadGateway(format!(
                "provider returned {status} for realtime session"
            )));
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| ApiError::BadGateway(format!("invalid realtime session response: {e}")))?;
        Ok(session.client_secret)
    }

    /// Runs one chat completion constrained to a JSON object and returns the
    /// parsed object.
    pub async fn chat_json(&self, system: &str, user: &str) -> Result<Value, ApiError> {
        let key = self.api_key()?;
        let body = json!({
            "model": self.config.chat_model,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::BadGateway(format!("chat request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "provider rejected chat request");
            return Err(ApiError::BadGateway(format!("provider returned {status} for chat")));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ApiError::BadGateway(format!("invalid chat response: {e}")))?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ApiError::BadGateway("chat response has no content".into()))?;

        serde_json::from_str(&content)
            .map_err(|e| ApiError::BadGateway(format!("chat content is not JSON: {e}")))
    }
}
