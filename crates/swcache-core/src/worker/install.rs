//! Precache installation

use futures::future::try_join_all;
use swcache_proxy::FetchRequest;
use swcache_storage::RequestKey;
use tracing::{debug, error, info};

use super::{CacheWorker, snapshot};
use crate::error::CoreError;
use crate::lifecycle::WorkerState;

impl CacheWorker {
    /// Handle the install event: populate the current cache with every
    /// precache URL.
    ///
    /// All assets are fetched before anything is written. Any fetch that
    /// fails or answers with a non-2xx status fails the whole install and
    /// leaves the worker redundant. Returns the number of entries written.
    pub async fn handle_install(&self) -> Result<usize, CoreError> {
        self.transition(WorkerState::New, WorkerState::Installing)?;
        info!("Installing cache worker {}", self.cache_name);

        match self.precache().await {
            Ok(count) => {
                self.set_state(WorkerState::Installed);
                info!("Installed {} ({} entries precached)", self.cache_name, count);
                Ok(count)
            }
            Err(e) => {
                self.set_state(WorkerState::Redundant);
                error!("Install of {} failed: {}", self.cache_name, e);
                Err(e)
            }
        }
    }

    async fn precache(&self) -> Result<usize, CoreError> {
        let cache = self.storage.open(&self.cache_name).await?;
        debug!("Cache opened: {}", cache.name());

        let urls = self.config.precache_urls()?;

        let fetches = urls.into_iter().map(|url| async move {
            debug!("Precaching {}", url);

            let response = self
                .fetcher
                .fetch(FetchRequest::get(url.clone()))
                .await
                .map_err(|e| CoreError::Precache {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;

            if !response.ok() {
                return Err(CoreError::Precache {
                    url: url.to_string(),
                    reason: format!("upstream returned {}", response.status),
                });
            }

            Ok((url, response))
        });

        let responses = try_join_all(fetches).await?;

        for (url, response) in &responses {
            cache.put(&RequestKey::get(url.as_str()), snapshot(response)).await?;
        }

        Ok(responses.len())
    }
}
