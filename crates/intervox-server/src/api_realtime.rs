//! `POST /api/realtime/token`: mints the AI candidate's session credential.

use crate::error::ApiError;
use crate::prompts::candidate_instructions;
use crate::provider::ClientSecret;
use crate::AppState;
use axum::extract::{Extension, Json};
use intervox_types::InterviewContext;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Response body for a minted realtime credential.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub client_secret: ClientSecret,
}

/// Handler for `POST /api/realtime/token`.
pub async fn token_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(context): Json<InterviewContext>,
) -> Result<Json<TokenResponse>, ApiError> {
    if !context.is_complete() {
        return Err(ApiError::BadRequest("candidate_name is required".into()));
    }

    let instructions = candidate_instructions(&context);
    let client_secret = state.provider.create_realtime_session(&instructions).await?;

    tracing::info!(
        role = %context.role,
        expires_at = ?client_secret.expires_at,
        "minted realtime credential"
    );
    Ok(Json(TokenResponse { client_secret }))
}
