//! Interception counters

use serde::Serialize;

/// Running totals kept by a cache worker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Requests answered from the cache
    pub hit_count: u64,
    /// Requests with no stored entry
    pub miss_count: u64,
    /// Requests whose entry was stale or undated
    pub stale_count: u64,
    /// Requests left to the default path
    pub passthrough_count: u64,
    /// Network fetches that produced no response
    pub network_error_count: u64,
    /// Completed write-backs
    pub write_back_count: u64,
    /// Write-backs that failed to store
    pub write_back_failure_count: u64,
}
