use crate::credential::EphemeralCredential;
use crate::error::VoiceError;
use async_trait::async_trait;
use tracing::{debug, warn};

/// Submits a local SDP offer to the voice-agent provider and returns its
/// answer.
///
/// There is no timeout: a hung request leaves the session negotiating until
/// the user stops it.
#[async_trait]
pub trait SdpNegotiator: Send + Sync {
    async fn negotiate(
        &self,
        offer_sdp: &str,
        credential: &EphemeralCredential,
    ) -> Result<String, VoiceError>;
}

/// Posts the offer to the provider's realtime endpoint with the ephemeral
/// secret as bearer credential.
#[derive(Debug, Clone)]
pub struct RealtimeNegotiator {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl RealtimeNegotiator {
    pub fn new(url: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url, model)
    }

    pub fn with_client(
        client: reqwest::Client,
        url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl SdpNegotiator for RealtimeNegotiator {
    async fn negotiate(
        &self,
        offer_sdp: &str,
        credential: &EphemeralCredential,
    ) -> Result<String, VoiceError> {
        debug!(url = %self.url, model = %self.model, offer_len = offer_sdp.len(), "submitting SDP offer");

        let response = self
            .client
            .post(&self.url)
            .query(&[("model", self.model.as_str())])
            .bearer_auth(&credential.value)
            .header(reqwest::header::CONTENT_TYPE, "application/sdp")
            .body(offer_sdp.to_string())
            .send()
            .await
            .map_err(|e| VoiceError::Negotiation(format!("SDP exchange failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            // Surfaced verbatim; the body is not applied.
            let text = status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.as_str().to_string());
            warn!(%status, "voice-agent endpoint rejected offer");
            return Err(VoiceError::Negotiation(text));
        }

        let answer = response
            .text()
            .await
            .map_err(|e| VoiceError::Negotiation(format!("failed to read SDP answer: {e}")))?;

        if answer.trim().is_empty() {
            return Err(VoiceError::Negotiation("empty SDP answer".to_string()));
        }

        Ok(answer)
    }
}
