//! Cache-first request interception

use http::{Method, StatusCode};
use std::sync::Arc;
use swcache_proxy::{FetchRequest, FetchResponse};
use swcache_storage::{CacheStorage, RequestKey, StoredResponse};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{CacheWorker, restore, snapshot};
use crate::error::CoreError;
use crate::freshness::Freshness;
use crate::lifecycle::WorkerState;
use crate::stats::CacheStats;

/// Decision taken for an intercepted request
#[derive(Debug)]
pub enum FetchOutcome {
    /// Not handled; the host sends the request down its default path
    Passthrough,
    /// Handled; this is the only response for the request
    Respond(Served),
}

impl FetchOutcome {
    pub fn is_passthrough(&self) -> bool {
        matches!(self, FetchOutcome::Passthrough)
    }
}

/// Where a served response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Cache => "cache",
            ResponseSource::Network => "network",
        }
    }
}

/// A response produced by the interceptor
#[derive(Debug)]
pub struct Served {
    pub response: FetchResponse,
    pub source: ResponseSource,
    /// Pending store of a network response, if one was started
    pub write_back: Option<WriteBack>,
}

/// Handle to a background write-back.
///
/// The write-back runs whether or not this handle is kept; dropping it
/// detaches the task.
#[derive(Debug)]
pub struct WriteBack {
    handle: JoinHandle<bool>,
}

impl WriteBack {
    /// Wait for the write-back to settle; `true` if the entry was stored
    pub async fn wait(self) -> bool {
        self.handle.await.unwrap_or(false)
    }
}

impl CacheWorker {
    /// Handle a fetch event.
    ///
    /// Serves a stored entry younger than the configured max age, otherwise
    /// goes to the network. A `200` from the network is written back to the
    /// current cache in the background and returned without waiting for the
    /// write; concurrent requests for the same URL may still see the old
    /// entry until it lands. Network failures are returned as errors.
    pub async fn handle_fetch(&self, request: FetchRequest) -> Result<FetchOutcome, CoreError> {
        if self.config.is_excluded(&request.url) || request.method != Method::GET {
            debug!("Passing through {} {}", request.method, request.url);
            self.stats.write().await.passthrough_count += 1;
            metrics::counter!("swcache_passthrough_total").increment(1);
            return Ok(FetchOutcome::Passthrough);
        }

        let mut key_url = request.url.clone();
        key_url.set_fragment(None);
        let key = RequestKey::get(key_url.as_str());

        match self.lookup(&key).await {
            Some(entry) => {
                let freshness = Freshness::evaluate(&entry, self.clock.now(), self.config.max_age);

                if freshness.is_fresh() {
                    if let Some(response) = restore(entry) {
                        debug!("Cache hit for {} ({})", key, freshness);
                        self.stats.write().await.hit_count += 1;
                        metrics::counter!("swcache_cache_hits_total").increment(1);
                        return Ok(FetchOutcome::Respond(Served {
                            response,
                            source: ResponseSource::Cache,
                            write_back: None,
                        }));
                    }
                    warn!("Stored entry for {} is unreadable, refetching", key);
                } else {
                    debug!("Cached entry for {} is {}, refetching", key, freshness);
                }

                self.stats.write().await.stale_count += 1;
                metrics::counter!("swcache_cache_stale_total").increment(1);
            }
            None => {
                debug!("Cache miss for {}", key);
                self.stats.write().await.miss_count += 1;
                metrics::counter!("swcache_cache_misses_total").increment(1);
            }
        }

        let response = match self.fetcher.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                info!("Network fetch for {} failed: {}", key, e);
                self.stats.write().await.network_error_count += 1;
                return Err(CoreError::Proxy(e));
            }
        };

        let write_back = if response.status == StatusCode::OK {
            Some(self.spawn_write_back(key, snapshot(&response)))
        } else {
            debug!("Not caching {}: status {}", key, response.status);
            None
        };

        Ok(FetchOutcome::Respond(Served {
            response,
            source: ResponseSource::Network,
            write_back,
        }))
    }

    /// Read the current cache's entry for `key`; read failures count as a miss.
    ///
    /// Looking up never creates the cache.
    async fn lookup(&self, key: &RequestKey) -> Option<StoredResponse> {
        let result = match self.storage.get(&self.cache_name).await {
            Ok(Some(cache)) => cache.match_request(key).await,
            Ok(None) => return None,
            Err(e) => Err(e),
        };

        result.unwrap_or_else(|e| {
            warn!("Cache lookup for {} failed: {}", key, e);
            None
        })
    }

    fn spawn_write_back(&self, key: RequestKey, entry: StoredResponse) -> WriteBack {
        let storage = self.storage.clone();
        let cache_name = self.cache_name.clone();
        let state = self.state.clone();
        let stats = self.stats.clone();

        let handle = tokio::spawn(async move {
            // A superseded worker must not recreate its pruned cache
            if *state.read() == WorkerState::Redundant {
                debug!("Skipping write-back for {}: worker is redundant", key);
                return false;
            }

            let stored = write_back(storage, &cache_name, &key, entry, &stats).await;
            if stored {
                metrics::counter!("swcache_write_backs_total").increment(1);
            }
            stored
        });

        WriteBack { handle }
    }
}

async fn write_back(
    storage: Arc<dyn CacheStorage>,
    cache_name: &str,
    key: &RequestKey,
    entry: StoredResponse,
    stats: &RwLock<CacheStats>,
) -> bool {
    let result = match storage.open(cache_name).await {
        Ok(cache) => cache.put(key, entry).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            debug!("Stored {} in {}", key, cache_name);
            stats.write().await.write_back_count += 1;
            true
        }
        Err(e) => {
            warn!("Write-back of {} to {} failed: {}", key, cache_name, e);
            stats.write().await.write_back_failure_count += 1;
            false
        }
    }
}
