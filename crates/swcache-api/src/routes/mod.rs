//! API routes

mod gateway;
mod health;
pub mod metrics;
mod status;

pub use gateway::SOURCE_HEADER;

use axum::Router;
use std::sync::Arc;

use crate::state::{AppState, MetricsHandle};

/// Create the main router
pub fn create_router(state: AppState, metrics_handle: Option<Arc<MetricsHandle>>) -> Router {
    let mut router = Router::new()
        .merge(health::routes())
        .merge(status::routes())
        // Everything else is application traffic for the worker
        .fallback(gateway::intercept)
        .with_state(state);

    if let Some(handle) = metrics_handle {
        router = router.merge(metrics::routes(handle));
    }

    router
}
