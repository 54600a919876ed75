use crate::error::CoachError;
use async_trait::async_trait;
use intervox_types::{CoachSuggestion, SuggestionRequest};
use tracing::debug;

/// Produces a coaching suggestion for one exchange.
#[async_trait]
pub trait SuggestionSource: Send + Sync {
    async fn suggest(&self, request: &SuggestionRequest) -> Result<CoachSuggestion, CoachError>;
}

/// Posts exchanges to the trust-boundary suggestion endpoint.
#[derive(Debug, Clone)]
pub struct HttpSuggestionClient {
    client: reqwest::Client,
    url: String,
}

impl HttpSuggestionClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl SuggestionSource for HttpSuggestionClient {
    async fn suggest(&self, request: &SuggestionRequest) -> Result<CoachSuggestion, CoachError> {
        debug!(
            url = %self.url,
            exchange_len = request.last_exchange_text.len(),
            elapsed_minutes = request.elapsed_minutes,
            "requesting coaching suggestion"
        );

        let response = self.client.post(&self.url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoachError::Status(status.as_u16()));
        }

        let suggestion: CoachSuggestion = response
            .json()
            .await
            .map_err(|e| CoachError::Decode(e.to_string()))?;

        if suggestion.suggested_next_question.trim().is_empty() {
            return Err(CoachError::Decode(
                "suggestion has no follow-up question".to_string(),
            ));
        }

        Ok(suggestion)
    }
}
