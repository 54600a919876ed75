//! `POST /api/coach/suggest`: scores an exchange and proposes a follow-up.

use crate::error::ApiError;
use crate::prompts::{coach_user_prompt, COACH_SYSTEM_PROMPT};
use crate::AppState;
use axum::extract::{Extension, Json};
use intervox_types::{CoachSuggestion, SuggestionRequest};
use std::sync::Arc;

/// Handler for `POST /api/coach/suggest`.
pub async fn suggest_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<SuggestionRequest>,
) -> Result<Json<CoachSuggestion>, ApiError> {
    if request.last_exchange_text.trim().is_empty() {
        return Err(ApiError::BadRequest("lastExchangeText is required".into()));
    }

    let object = state
        .provider
        .chat_json(COACH_SYSTEM_PROMPT, &coach_user_prompt(&request))
        .await?;

    let suggestion: CoachSuggestion = serde_json::from_value(object)
        .map_err(|e| ApiError::BadGateway(format!("unusable suggestion: {e}")))?;
    if suggestion.suggested_next_question.trim().is_empty() {
        return Err(ApiError::BadGateway("suggestion has no follow-up question".into()));
    }

    tracing::debug!(
        elapsed_minutes = request.elapsed_minutes,
        quality = ?suggestion.answer_quality,
        "coaching suggestion produced"
    );
    Ok(Json(suggestion))
}
