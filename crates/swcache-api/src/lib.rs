//! swcache Gateway API
//!
//! This crate provides the Axum router of the caching gateway: every request
//! outside the few service endpoints is run through the active cache worker.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{AppState, MetricsHandle};
