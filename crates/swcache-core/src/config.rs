//! Cache worker configuration

use std::time::Duration;
use swcache_storage::validate_cache_name;
use url::Url;

use crate::error::CoreError;

/// URL prefixes the interceptor never handles
pub const DEFAULT_EXCLUDED_PREFIXES: &[&str] = &["chrome-extension://"];

/// Everything a cache worker needs to know about its version and policy
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Family prefix shared by every version's cache (e.g. "my-site-cache")
    pub cache_prefix: String,
    /// Version number; the current cache is `<prefix>-v<version>`
    pub version: u32,
    /// Base URL relative precache entries resolve against
    pub scope: Url,
    /// Assets fetched and stored at install time
    pub precache: Vec<String>,
    /// Entries at least this old are refetched
    pub max_age: Duration,
    /// Requests whose URL starts with one of these are passed through
    pub excluded_prefixes: Vec<String>,
}

impl WorkerConfig {
    pub fn new(cache_prefix: impl Into<String>, version: u32, scope: Url, max_age: Duration) -> Self {
        Self {
            cache_prefix: cache_prefix.into(),
            version,
            scope,
            precache: Vec::new(),
            max_age,
            excluded_prefixes: DEFAULT_EXCLUDED_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }

    pub fn with_precache<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.precache = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_excluded_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Check the configuration can produce a usable worker
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.cache_prefix.is_empty() {
            return Err(CoreError::InvalidConfig(
                "cache prefix must not be empty".to_string(),
            ));
        }

        validate_cache_name(&self.cache_name())
            .map_err(|e| CoreError::InvalidConfig(e.to_string()))?;

        if self.max_age.is_zero() {
            return Err(CoreError::InvalidConfig(
                "max age must be greater than zero".to_string(),
            ));
        }

        if self.scope.cannot_be_a_base() {
            return Err(CoreError::InvalidConfig(format!(
                "scope {} cannot be used as a base URL",
                self.scope
            )));
        }

        // Surface bad precache entries now rather than at install time
        self.precache_urls()?;

        Ok(())
    }

    /// Name of the cache this version owns
    pub fn cache_name(&self) -> String {
        format!("{}-v{}", self.cache_prefix, self.version)
    }

    /// Prefix every cache of this family starts with
    pub fn family_prefix(&self) -> String {
        format!("{}-", self.cache_prefix)
    }

    /// Whether `name` belongs to this family but not to this version
    pub fn is_stale_cache(&self, name: &str) -> bool {
        name.starts_with(&self.family_prefix()) && name != self.cache_name()
    }

    /// Whether requests for `url` must be left to the default path
    pub fn is_excluded(&self, url: &Url) -> bool {
        self.excluded_prefixes
            .iter()
            .any(|prefix| url.as_str().starts_with(prefix.as_str()))
    }

    /// Precache entries resolved against the scope, in configured order
    pub fn precache_urls(&self) -> Result<Vec<Url>, CoreError> {
        self.precache
            .iter()
            .map(|entry| {
                self.scope
                    .join(entry)
                    .map_err(|e| CoreError::InvalidUrl(format!("{}: {}", entry, e)))
            })
            .collect()
    }
}
