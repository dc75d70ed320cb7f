//! Activation and pruning of superseded caches

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::CacheWorker;
use crate::error::CoreError;
use crate::lifecycle::WorkerState;

/// Result of a pruning pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    /// Caches that were deleted
    pub deleted: Vec<String>,
    /// Caches that could not be deleted, with the reason
    pub failed: Vec<(String, String)>,
}

impl CacheWorker {
    /// Handle the activate event: delete every cache of this family except
    /// the current one.
    ///
    /// Pruning failures are logged and reported but never block activation.
    pub async fn handle_activate(&self) -> Result<PruneReport, CoreError> {
        self.transition(WorkerState::Installed, WorkerState::Activating)?;
        info!("Activating cache worker {}", self.cache_name);

        let report = self.prune().await;

        self.set_state(WorkerState::Activated);
        info!(
            "Activated {} ({} stale caches deleted, {} failed)",
            self.cache_name,
            report.deleted.len(),
            report.failed.len()
        );

        Ok(report)
    }

    /// Delete all same-family caches other than the current one
    pub async fn prune(&self) -> PruneReport {
        let mut report = PruneReport::default();

        let names = match self.storage.keys().await {
            Ok(names) => names,
            Err(e) => {
                warn!("Failed to list caches for pruning: {}", e);
                return report;
            }
        };
        debug!("Existing caches: {:?}", names);

        let stale: Vec<String> = names
            .into_iter()
            .filter(|name| self.config.is_stale_cache(name))
            .collect();

        let results = join_all(stale.into_iter().map(|name| async move {
            let result = self.storage.delete(&name).await;
            (name, result)
        }))
        .await;

        for (name, result) in results {
            match result {
                Ok(true) => {
                    info!("Deleted stale cache {}", name);
                    metrics::counter!("swcache_pruned_caches_total").increment(1);
                    report.deleted.push(name);
                }
                Ok(false) => debug!("Stale cache {} was already gone", name),
                Err(e) => {
                    warn!("Failed to delete stale cache {}: {}", name, e);
                    report.failed.push((name, e.to_string()));
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;
    use async_trait::async_trait;
    use std::sync::Arc;
    use swcache_storage::{Cache, CacheStorage, MemoryCacheStorage, StorageError};

    /// Storage whose deletes of one name always fail
    struct StubbornStorage {
        inner: MemoryCacheStorage,
        stubborn: &'static str,
        unlistable: bool,
    }

    fn permission_denied() -> StorageError {
        StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "permission denied",
        ))
    }

    #[async_trait]
    impl CacheStorage for StubbornStorage {
        async fn open(&self, name: &str) -> Result<Arc<dyn Cache>, StorageError> {
            self.inner.open(name).await
        }

        async fn get(&self, name: &str) -> Result<Option<Arc<dyn Cache>>, StorageError> {
            self.inner.get(name).await
        }

        async fn has(&self, name: &str) -> Result<bool, StorageError> {
            self.inner.has(name).await
        }

        async fn keys(&self) -> Result<Vec<String>, StorageError> {
            if self.unlistable {
                return Err(permission_denied());
            }
            self.inner.keys().await
        }

        async fn delete(&self, name: &str) -> Result<bool, StorageError> {
            if name == self.stubborn {
                return Err(permission_denied());
            }
            self.inner.delete(name).await
        }
    }

    #[tokio::test]
    async fn test_activate_deletes_old_versions_only() {
        let fixture = Fixture::new();
        for name in ["my-site-cache-v1", "my-site-cache-v2", "unrelated-v1"] {
            fixture.storage.open(name).await.unwrap();
        }
        let worker = fixture.worker(fixture.config(2));
        worker.handle_install().await.unwrap();

        let report = worker.handle_activate().await.unwrap();

        assert_eq!(report.deleted, vec!["my-site-cache-v1".to_string()]);
        assert!(report.failed.is_empty());
        assert_eq!(worker.state(), WorkerState::Activated);
        assert_eq!(
            fixture.storage.keys().await.unwrap(),
            vec!["my-site-cache-v2".to_string(), "unrelated-v1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_activate_deletes_every_older_generation() {
        let fixture = Fixture::new();
        for name in ["my-site-cache-v1", "my-site-cache-v2", "my-site-cache-v3"] {
            fixture.storage.open(name).await.unwrap();
        }
        let worker = fixture.worker(fixture.config(3));
        worker.handle_install().await.unwrap();

        let report = worker.handle_activate().await.unwrap();

        assert_eq!(report.deleted.len(), 2);
        assert_eq!(
            fixture.storage.keys().await.unwrap(),
            vec!["my-site-cache-v3".to_string()]
        );
    }

    #[tokio::test]
    async fn test_delete_failure_does_not_block_activation() {
        let fixture = Fixture::new();
        let storage = Arc::new(StubbornStorage {
            inner: MemoryCacheStorage::new(),
            stubborn: "my-site-cache-v1",
            unlistable: false,
        });
        for name in ["my-site-cache-v0", "my-site-cache-v1"] {
            storage.open(name).await.unwrap();
        }

        let worker = crate::worker::CacheWorker::new(
            fixture.config(2),
            storage.clone(),
            fixture.fetcher.clone(),
        )
        .unwrap();
        worker.handle_install().await.unwrap();

        let report = worker.handle_activate().await.unwrap();

        assert_eq!(report.deleted, vec!["my-site-cache-v0".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "my-site-cache-v1");
        assert_eq!(worker.state(), WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_listing_failure_does_not_block_activation() {
        let fixture = Fixture::new();
        let storage = Arc::new(StubbornStorage {
            inner: MemoryCacheStorage::new(),
            stubborn: "",
            unlistable: true,
        });
        storage.open("my-site-cache-v1").await.unwrap();

        let worker = crate::worker::CacheWorker::new(
            fixture.config(2),
            storage.clone(),
            fixture.fetcher.clone(),
        )
        .unwrap();
        worker.handle_install().await.unwrap();

        let report = worker.handle_activate().await.unwrap();

        assert_eq!(report, PruneReport::default());
        assert_eq!(worker.state(), WorkerState::Activated);
        assert!(storage.has("my-site-cache-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_activate_requires_install() {
        let fixture = Fixture::new();
        let worker = fixture.worker(fixture.config(2));

        assert!(matches!(
            worker.handle_activate().await,
            Err(CoreError::InvalidState {
                expected: WorkerState::Installed,
                actual: WorkerState::New,
            })
        ));
    }
}
