//! Cache worker: one instance per cache version

mod install;
mod intercept;
mod prune;

pub use intercept::{FetchOutcome, ResponseSource, Served, WriteBack};
pub use prune::PruneReport;

use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use parking_lot::RwLock as StateLock;
use std::sync::Arc;
use swcache_proxy::{FetchResponse, Fetcher};
use swcache_storage::{CacheStorage, StoredResponse};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::clock::{Clock, SystemClock};
use crate::config::WorkerConfig;
use crate::error::CoreError;
use crate::lifecycle::WorkerState;
use crate::stats::CacheStats;

/// Cache manager for a single version of the cache.
///
/// Owns the install, fetch and activate handling for the cache named by its
/// configuration. The store and the network are injected so the same worker
/// runs against disk, memory, or a stubbed network.
pub struct CacheWorker {
    config: WorkerConfig,
    cache_name: String,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
    state: Arc<StateLock<WorkerState>>,
    stats: Arc<RwLock<CacheStats>>,
}

impl CacheWorker {
    /// Create a new cache worker
    pub fn new(
        config: WorkerConfig,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let cache_name = config.cache_name();

        info!(
            "Initializing cache worker (cache: {}, max_age: {:?}, precache: {} urls)",
            cache_name,
            config.max_age,
            config.precache.len()
        );

        Ok(Self {
            config,
            cache_name,
            storage,
            fetcher,
            clock: Arc::new(SystemClock),
            state: Arc::new(StateLock::new(WorkerState::New)),
            stats: Arc::new(RwLock::new(CacheStats::default())),
        })
    }

    /// Replace the wall clock used for entry ages
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Name of the cache this worker reads and writes
    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn state(&self) -> WorkerState {
        *self.state.read()
    }

    /// Get interception statistics
    pub async fn stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }

    /// Move from `expected` to `next`, failing if the worker is elsewhere
    fn transition(&self, expected: WorkerState, next: WorkerState) -> Result<(), CoreError> {
        let mut state = self.state.write();
        if *state != expected {
            return Err(CoreError::InvalidState {
                expected,
                actual: *state,
            });
        }

        debug!("Worker {}: {} -> {}", self.cache_name, *state, next);
        *state = next;
        Ok(())
    }

    fn set_state(&self, next: WorkerState) {
        let mut state = self.state.write();
        debug!("Worker {}: {} -> {}", self.cache_name, *state, next);
        *state = next;
    }

    /// Retire this worker once a newer version takes over
    pub fn mark_redundant(&self) {
        self.set_state(WorkerState::Redundant);
    }
}

/// Snapshot a network response for storage
fn snapshot(response: &FetchResponse) -> StoredResponse {
    let headers = response
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    StoredResponse {
        url: response.url.to_string(),
        status: response.status.as_u16(),
        headers,
        body: response.body.clone(),
    }
}

/// Rebuild a response from a stored entry.
///
/// Returns `None` when the entry cannot be represented as a response.
fn restore(entry: StoredResponse) -> Option<FetchResponse> {
    let status = StatusCode::from_u16(entry.status).ok()?;
    let url = Url::parse(&entry.url).ok()?;

    let mut headers = HeaderMap::with_capacity(entry.headers.len());
    for (name, value) in entry.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => warn!("Dropping unrepresentable stored header {}", name),
        }
    }

    Some(FetchResponse {
        url,
        status,
        headers,
        body: entry.body,
    })
}
