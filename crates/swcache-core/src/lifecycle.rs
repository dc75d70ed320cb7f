//! Worker lifecycle and version registration

use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use swcache_proxy::FetchRequest;
use tracing::{info, warn};

use crate::error::CoreError;
use crate::worker::{CacheWorker, FetchOutcome, PruneReport};

/// Lifecycle state of one worker version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Constructed, install not started
    New,
    Installing,
    /// Precache complete, waiting to activate
    Installed,
    Activating,
    /// Serving requests
    Activated,
    /// Failed to install, or superseded by a newer version
    Redundant,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::New => "new",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of registering a worker version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// The worker installed, activated and now handles requests
    Activated { precached: usize, pruned: PruneReport },
    /// A worker for the same cache version is already active
    Unchanged,
}

/// Tracks which worker version is active and drives new versions through
/// install and activation.
#[derive(Default)]
pub struct Registration {
    active: RwLock<Option<Arc<CacheWorker>>>,
}

impl Registration {
    pub fn new() -> Self {
        Self::default()
    }

    /// The worker currently handling requests
    pub fn active(&self) -> Option<Arc<CacheWorker>> {
        self.active.read().clone()
    }

    /// Install and activate `worker`, replacing the active version.
    ///
    /// If install fails the previously active worker keeps serving and the
    /// error is returned. Requests keep going to the previous worker until
    /// the new one has finished pruning.
    pub async fn register(&self, worker: Arc<CacheWorker>) -> Result<RegisterOutcome, CoreError> {
        let previous = self.active();

        if let Some(current) = &previous
            && current.cache_name() == worker.cache_name()
        {
            info!("{} is already active", worker.cache_name());
            return Ok(RegisterOutcome::Unchanged);
        }

        let precached = match worker.handle_install().await {
            Ok(count) => count,
            Err(e) => {
                match &previous {
                    Some(current) => warn!(
                        "Keeping {} active after failed install of {}",
                        current.cache_name(),
                        worker.cache_name()
                    ),
                    None => warn!("No cache worker active after failed install"),
                }
                return Err(e);
            }
        };

        // The previous version stops writing before its cache is pruned
        if let Some(current) = &previous {
            current.mark_redundant();
        }

        let pruned = worker.handle_activate().await?;

        *self.active.write() = Some(worker.clone());
        info!("{} is now active", worker.cache_name());

        Ok(RegisterOutcome::Activated { precached, pruned })
    }

    /// Route a fetch event to the active worker.
    ///
    /// With no active worker every request is passed through.
    pub async fn handle_fetch(&self, request: FetchRequest) -> Result<FetchOutcome, CoreError> {
        match self.active() {
            Some(worker) => worker.handle_fetch(request).await,
            None => Ok(FetchOutcome::Passthrough),
        }
    }
}
