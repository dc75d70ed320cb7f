//! Fetch primitive and the request/response types it works with

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use url::Url;

use crate::error::ProxyError;

/// An outgoing request as seen by the interceptor
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl FetchRequest {
    /// A bodiless `GET` for `url`
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Parse `url` and build a `GET` for it
    pub fn get_str(url: &str) -> Result<Self, ProxyError> {
        let url = Url::parse(url)
            .map_err(|e| ProxyError::InvalidRequest(format!("{}: {}", url, e)))?;
        Ok(Self::get(url))
    }
}

/// A complete (fully buffered) response
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// Final URL after redirects
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl FetchResponse {
    /// Whether the status is in the 2xx range
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }
}

/// Network fetch primitive.
///
/// A returned `Ok` carries whatever status the server answered with;
/// `Err` means no response was obtained at all.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, ProxyError>;
}
