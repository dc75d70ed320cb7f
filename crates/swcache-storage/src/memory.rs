//! In-memory storage backend

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::backend::{Cache, CacheStorage, RequestKey, StoredResponse, validate_cache_name};
use crate::error::StorageError;

/// Cache storage held entirely in process memory.
///
/// Nothing survives a restart. A handle obtained from `open` keeps working
/// after its cache is deleted, but writes through it are no longer visible
/// to later `open` calls.
#[derive(Default)]
pub struct MemoryCacheStorage {
    caches: RwLock<BTreeMap<String, Arc<MemoryCache>>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>, StorageError> {
        validate_cache_name(name)?;

        let cache: Arc<dyn Cache> = self
            .caches
            .write()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCache::new(name)))
            .clone();

        Ok(cache)
    }

    async fn get(&self, name: &str) -> Result<Option<Arc<dyn Cache>>, StorageError> {
        Ok(self
            .caches
            .read()
            .get(name)
            .map(|cache| cache.clone() as Arc<dyn Cache>))
    }

    async fn has(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.caches.read().contains_key(name))
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.caches.read().keys().cloned().collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.caches.write().remove(name).is_some())
    }
}

struct MemoryCache {
    name: String,
    entries: RwLock<HashMap<RequestKey, StoredResponse>>,
}

impl MemoryCache {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn match_request(&self, key: &RequestKey) -> Result<Option<StoredResponse>, StorageError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn put(&self, key: &RequestKey, response: StoredResponse) -> Result<(), StorageError> {
        self.entries.write().insert(key.clone(), response);
        Ok(())
    }

    async fn delete(&self, key: &RequestKey) -> Result<bool, StorageError> {
        Ok(self.entries.write().remove(key).is_some())
    }

    async fn keys(&self) -> Result<Vec<RequestKey>, StorageError> {
        let mut keys: Vec<RequestKey> = self.entries.read().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
