//! Local disk storage backend

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{Cache, CacheStorage, RequestKey, StoredResponse, validate_cache_name};
use crate::error::StorageError;

const ENTRY_EXTENSION: &str = "entry";

/// Header line written in front of every entry body
#[derive(Debug, Serialize, Deserialize)]
struct EntryHeader {
    method: String,
    url: String,
    response_url: String,
    status: u16,
    headers: Vec<(String, String)>,
}

/// Local disk storage backend
///
/// Every cache is a directory and every entry a single file:
/// `<base_path>/caches/<cache name>/<sha256 of key>.entry`
///
/// An entry file is one line of JSON metadata followed by the raw body.
pub struct LocalCacheStorage {
    caches_path: PathBuf,
}

impl LocalCacheStorage {
    /// Create a new local storage backend
    pub async fn new(base_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let caches_path = base_path.as_ref().join("caches");
        fs::create_dir_all(&caches_path).await?;

        info!("Initialized local cache storage at {:?}", caches_path);

        Ok(Self { caches_path })
    }

    fn cache_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        validate_cache_name(name)?;
        Ok(self.caches_path.join(name))
    }
}

#[async_trait]
impl CacheStorage for LocalCacheStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>, StorageError> {
        let path = self.cache_path(name)?;
        fs::create_dir_all(&path).await?;
        debug!("Opened cache {} at {:?}", name, path);

        Ok(Arc::new(LocalCache {
            name: name.to_string(),
            path,
        }))
    }

    async fn get(&self, name: &str) -> Result<Option<Arc<dyn Cache>>, StorageError> {
        if !self.has(name).await? {
            return Ok(None);
        }

        let cache: Arc<dyn Cache> = Arc::new(LocalCache {
            name: name.to_string(),
            path: self.cache_path(name)?,
        });
        Ok(Some(cache))
    }

    async fn has(&self, name: &str) -> Result<bool, StorageError> {
        let path = self.cache_path(name)?;
        match fs::metadata(&path).await {
            Ok(metadata) => Ok(metadata.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut names = Vec::new();
        let mut dir = fs::read_dir(&self.caches_path).await?;

        while let Some(item) = dir.next_entry().await? {
            if !item.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = item.file_name().to_str() {
                names.push(name.to_string());
            }
        }

        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> Result<bool, StorageError> {
        let path = self.cache_path(name)?;
        debug!("Deleting cache {} at {:?}", name, path);

        match fs::remove_dir_all(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

/// A cache directory on local disk
struct LocalCache {
    name: String,
    path: PathBuf,
}

impl LocalCache {
    fn entry_path(&self, key: &RequestKey) -> PathBuf {
        self.path
            .join(format!("{}.{}", key.digest(), ENTRY_EXTENSION))
    }

    fn decode(path: &Path, raw: &[u8]) -> Result<(EntryHeader, Bytes), StorageError> {
        let split = raw
            .iter()
            .position(|b| *b == b'\n')
            .ok_or_else(|| StorageError::Corrupt(format!("missing header in {:?}", path)))?;

        let header: EntryHeader = serde_json::from_slice(&raw[..split])?;
        let body = Bytes::copy_from_slice(&raw[split + 1..]);
        Ok((header, body))
    }

    /// Read only the header line of an entry file
    async fn read_header(path: &Path) -> Result<EntryHeader, StorageError> {
        let file = fs::File::open(path).await?;
        let mut reader = BufReader::new(file);
        let mut line = Vec::new();
        reader.read_until(b'\n', &mut line).await?;

        if line.pop() != Some(b'\n') {
            return Err(StorageError::Corrupt(format!("missing header in {:?}", path)));
        }
        Ok(serde_json::from_slice(&line)?)
    }
}

#[async_trait]
impl Cache for LocalCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn match_request(&self, key: &RequestKey) -> Result<Option<StoredResponse>, StorageError> {
        let path = self.entry_path(key);

        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::Io(e)),
        };

        let (header, body) = Self::decode(&path, &raw)?;

        // Digest collision or a hand-edited file
        if header.method != key.method() || header.url != key.url() {
            warn!("Entry {:?} does not belong to {}", path, key);
            return Ok(None);
        }

        Ok(Some(StoredResponse {
            url: header.response_url,
            status: header.status,
            headers: header.headers,
            body,
        }))
    }

    async fn put(&self, key: &RequestKey, response: StoredResponse) -> Result<(), StorageError> {
        let path = self.entry_path(key);
        debug!("Writing entry {} to {:?}", key, path);

        let header = EntryHeader {
            method: key.method().to_string(),
            url: key.url().to_string(),
            response_url: response.url,
            status: response.status,
            headers: response.headers,
        };

        let mut raw = serde_json::to_vec(&header)?;
        raw.push(b'\n');
        raw.extend_from_slice(&response.body);

        // Write atomically; each writer gets its own temp file so the last
        // rename wins
        let temp_path = self
            .path
            .join(format!("{}.{}.tmp", key.digest(), Uuid::new_v4()));
        fs::write(&temp_path, &raw).await?;
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::Io(e));
        }

        Ok(())
    }

    async fn delete(&self, key: &RequestKey) -> Result<bool, StorageError> {
        match fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn keys(&self) -> Result<Vec<RequestKey>, StorageError> {
        let mut keys = Vec::new();

        let mut dir = match fs::read_dir(&self.path).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(keys),
            Err(e) => return Err(StorageError::Io(e)),
        };

        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }

            match Self::read_header(&path).await {
                Ok(header) => keys.push(RequestKey::new(&header.method, header.url)),
                Err(e) => warn!("Skipping unreadable entry {:?}: {}", path, e),
            }
        }

        keys.sort();
        Ok(keys)
    }
}
