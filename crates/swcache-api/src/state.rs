//! Application state

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use swcache_core::Registration;
use swcache_proxy::Fetcher;
use url::Url;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registration: Arc<Registration>,
    /// Default request path for passed-through requests
    pub fetcher: Arc<dyn Fetcher>,
    /// Origin that request paths are resolved against
    pub scope: Url,
}

impl AppState {
    pub fn new(registration: Arc<Registration>, fetcher: Arc<dyn Fetcher>, scope: Url) -> Self {
        Self {
            registration,
            fetcher,
            scope,
        }
    }
}

/// Renders the Prometheus exposition for `/metrics`
pub struct MetricsHandle {
    handle: PrometheusHandle,
}

impl MetricsHandle {
    pub fn new(handle: PrometheusHandle) -> Self {
        Self { handle }
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }
}
