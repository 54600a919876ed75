use crate::error::VoiceError;
use async_trait::async_trait;
use intervox_types::InterviewContext;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// A short-lived secret authorising one negotiation with the voice-agent
/// provider.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EphemeralCredential {
    pub value: String,
    /// Expiry as Unix seconds, when the issuer reports one.
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl EphemeralCredential {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            expires_at: None,
        }
    }
}

impl fmt::Debug for EphemeralCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EphemeralCredential")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Exchanges application context for a short-lived credential.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn fetch(&self, context: &InterviewContext) -> Result<EphemeralCredential, VoiceError>;
}

#[derive(Deserialize)]
struct TokenResponse {
    client_secret: EphemeralCredential,
}

/// Fetches credentials from the trust-boundary token endpoint over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCredentialProvider {
    client: reqwest::Client,
    url: String,
}

impl HttpCredentialProvider {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl CredentialProvider for HttpCredentialProvider {
    async fn fetch(&self, context: &InterviewContext) -> Result<EphemeralCredential, VoiceError> {
        debug!(url = %self.url, candidate = %context.candidate_name, "requesting voice credential");

        let response = self
            .client
            .post(&self.url)
            .json(context)
            .send()
            .await
            .map_err(|e| VoiceError::Configuration(format!("credential request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %self.url, %status, "credential endpoint rejected request");
            return Err(VoiceError::Configuration(format!(
                "credential endpoint returned {status}"
            )));
        }

        let body: TokenResponse = response.json().await.map_err(|e| {
            VoiceError::Configuration(format!("invalid credential response: {e}"))
        })?;

        if body.client_secret.value.trim().is_empty() {
            return Err(VoiceError::Configuration(
                "credential endpoint returned an empty secret".to_string(),
            ));
        }

        Ok(body.client_secret)
    }
}
