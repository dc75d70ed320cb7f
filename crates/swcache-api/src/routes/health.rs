//! Health check endpoints

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::state::AppState;

/// Health status response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Cache the active worker serves from; `None` while passing everything through
    pub active_cache: Option<String>,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    metrics::counter!("swcache_health_checks_total").increment(1);

    let active_cache = state
        .registration
        .active()
        .map(|worker| worker.cache_name().to_string());

    Json(HealthResponse {
        status: if active_cache.is_some() { "healthy" } else { "passthrough" },
        version: env!("CARGO_PKG_VERSION"),
        active_cache,
    })
}

/// Create health routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
}
