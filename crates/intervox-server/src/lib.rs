//! Trust-boundary HTTP service for Intervox.
//!
//! Holds the long-lived model provider key and exposes the two operations the
//! browser client needs: minting a short-lived realtime credential for the AI
//! candidate, and scoring an interview exchange for a coaching suggestion.

pub mod api_coach;
pub mod api_realtime;
pub mod config;
pub mod error;
pub mod prompts;
pub mod provider;

use axum::{
    extract::Extension,
    routing::{get, post},
    Json, Router,
};
use provider::ProviderClient;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub provider: ProviderClient,
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/realtime/token", post(api_realtime::token_handler))
        .route("/api/coach/suggest", post(api_coach::suggest_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
