//! swcache Storage Layer
//!
//! This crate provides the named cache stores the cache worker writes into,
//! with a local disk backend that survives restarts and an in-memory backend.

pub mod backend;
pub mod error;
pub mod local;
pub mod memory;

pub use backend::{Cache, CacheStorage, RequestKey, StoredResponse, validate_cache_name};
pub use error::StorageError;
pub use local::LocalCacheStorage;
pub use memory::MemoryCacheStorage;
