//! Worker status endpoint

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use swcache_core::{CacheStats, WorkerState};

use crate::state::AppState;

#[derive(Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub active: Option<ActiveWorker>,
}

#[derive(Serialize)]
pub struct ActiveWorker {
    pub cache_name: String,
    pub state: WorkerState,
    pub max_age_secs: u64,
    pub stats: CacheStats,
}

/// GET /-/status - active cache version and counters
async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let active = match state.registration.active() {
        Some(worker) => Some(ActiveWorker {
            cache_name: worker.cache_name().to_string(),
            state: worker.state(),
            max_age_secs: worker.config().max_age.as_secs(),
            stats: worker.stats().await,
        }),
        None => None,
    };

    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        active,
    })
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/-/status", get(status))
}
