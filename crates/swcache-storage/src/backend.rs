//! Cache storage traits and entry types

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

use crate::error::StorageError;

/// Key of a cache entry: the request method and absolute URL
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestKey {
    method: String,
    url: String,
}

impl RequestKey {
    /// Create a key, normalizing the method to upper case
    pub fn new(method: &str, url: impl Into<String>) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            url: url.into(),
        }
    }

    /// Key for a `GET` of `url`
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Hex SHA256 of `"<METHOD> <url>"`, used as a filesystem-safe entry id
    pub fn digest(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(self.method.as_bytes());
        hasher.update(b" ");
        hasher.update(self.url.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Snapshot of a response as held by a cache store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    /// Final URL the response was served from
    pub url: String,
    /// HTTP status code
    pub status: u16,
    /// Response headers in arrival order; names are compared case-insensitively
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: Bytes,
}

impl StoredResponse {
    /// First value of the named header
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Timestamp carried by the `date` header.
    ///
    /// Returns `None` when the header is absent or is not a valid HTTP date.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        let value = self.header("date")?;
        httpdate::parse_http_date(value.trim())
            .ok()
            .map(DateTime::<Utc>::from)
    }
}

/// A single named cache store
#[async_trait]
pub trait Cache: Send + Sync {
    /// Name this store was opened under
    fn name(&self) -> &str;

    /// Look up the entry stored for `key`
    async fn match_request(&self, key: &RequestKey) -> Result<Option<StoredResponse>, StorageError>;

    /// Store `response` under `key`, replacing any previous entry
    async fn put(&self, key: &RequestKey, response: StoredResponse) -> Result<(), StorageError>;

    /// Remove the entry for `key`
    async fn delete(&self, key: &RequestKey) -> Result<bool, StorageError>;

    /// List the keys currently stored
    async fn keys(&self) -> Result<Vec<RequestKey>, StorageError>;
}

/// Registry of named cache stores
///
/// Implementations own the persistence of every store they hand out.
/// Opening a name that does not exist yet creates it.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open (creating if absent) the store called `name`
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>, StorageError>;

    /// The store called `name`, or `None` if it does not exist. Never creates.
    async fn get(&self, name: &str) -> Result<Option<Arc<dyn Cache>>, StorageError>;

    /// Check whether a store called `name` exists
    async fn has(&self, name: &str) -> Result<bool, StorageError>;

    /// Names of all existing stores, sorted
    async fn keys(&self) -> Result<Vec<String>, StorageError>;

    /// Delete the store called `name` with all its entries
    async fn delete(&self, name: &str) -> Result<bool, StorageError>;
}

/// Validate a cache name before it is used as a path component
pub fn validate_cache_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(StorageError::InvalidCacheName(name.to_string()));
    }

    let valid = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Err(StorageError::InvalidCacheName(name.to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_with_headers(headers: &[(&str, &str)]) -> StoredResponse {
        StoredResponse {
            url: "http://localhost/app.js".to_string(),
            status: 200,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: Bytes::from_static(b"console.log(1)"),
        }
    }

    #[test]
    fn test_request_key_normalizes_method() {
        let key = RequestKey::new("get", "http://localhost/a");
        assert_eq!(key.method(), "GET");
        assert_eq!(key, RequestKey::get("http://localhost/a"));
        assert_eq!(key.to_string(), "GET http://localhost/a");
    }

    #[test]
    fn test_request_key_digest_differs_by_method() {
        let get = RequestKey::get("http://localhost/a");
        let head = RequestKey::new("HEAD", "http://localhost/a");
        assert_eq!(get.digest().len(), 64);
        assert_ne!(get.digest(), head.digest());
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let response = response_with_headers(&[("Content-Type", "text/javascript")]);
        assert_eq!(response.header("content-type"), Some("text/javascript"));
        assert_eq!(response.header("etag"), None);
    }

    #[test]
    fn test_date_parses_http_date() {
        let response = response_with_headers(&[("Date", "Sun, 06 Nov 1994 08:49:37 GMT")]);
        let date = response.date().unwrap();
        assert_eq!(date.to_rfc3339(), "1994-11-06T08:49:37+00:00");
    }

    #[test]
    fn test_date_missing_or_invalid() {
        assert!(response_with_headers(&[]).date().is_none());
        assert!(response_with_headers(&[("date", "yesterday")]).date().is_none());
    }

    #[test]
    fn test_validate_cache_name() {
        assert!(validate_cache_name("my-site-cache-v2").is_ok());
        assert!(validate_cache_name("assets_1.0").is_ok());
        assert!(validate_cache_name("").is_err());
        assert!(validate_cache_name("..").is_err());
        assert!(validate_cache_name("../etc").is_err());
        assert!(validate_cache_name("a/b").is_err());
    }
}
