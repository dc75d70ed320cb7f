//! swcache Core Logic
//!
//! This crate provides the cache worker: precaching on install, cache-first
//! interception with a staleness threshold, and pruning of superseded cache
//! versions on activation.

pub mod clock;
pub mod config;
pub mod error;
pub mod freshness;
pub mod lifecycle;
pub mod stats;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DEFAULT_EXCLUDED_PREFIXES, WorkerConfig};
pub use error::CoreError;
pub use freshness::Freshness;
pub use lifecycle::{RegisterOutcome, Registration, WorkerState};
pub use stats::CacheStats;
pub use worker::{CacheWorker, FetchOutcome, PruneReport, ResponseSource, Served, WriteBack};
