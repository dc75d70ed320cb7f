//! reqwest-backed fetcher

use async_trait::async_trait;
use http::header;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::ProxyError;
use crate::fetcher::{FetchRequest, FetchResponse, Fetcher};

/// HTTP fetcher configuration
#[derive(Clone, Debug)]
pub struct HttpFetcherConfig {
    /// Skip TLS certificate verification
    pub skip_tls_verify: bool,
    /// Per-request timeout; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            skip_tls_verify: false,
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Fetcher that performs real network requests
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a new HTTP fetcher
    pub fn new(config: HttpFetcherConfig) -> Result<Self, ProxyError> {
        let mut builder = Client::builder();

        if config.skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder.build()?;

        info!(
            "Created HTTP fetcher (timeout: {:?}, skip_tls_verify: {})",
            config.timeout, config.skip_tls_verify
        );

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, ProxyError> {
        debug!("Fetching {} {}", request.method, request.url);

        let mut headers = request.headers;
        // reqwest derives these from the target URL and body
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);

        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(headers);
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                ProxyError::Unavailable(e.to_string())
            } else {
                ProxyError::Http(e)
            }
        })?;

        let url = response.url().clone();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        debug!("Fetched {} -> {} ({} bytes)", url, status, body.len());

        Ok(FetchResponse {
            url,
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, http::StatusCode, routing::get};

    async fn spawn_origin() -> String {
        let app = Router::new()
            .route("/ok", get(|| async { ([("x-origin", "test")], "hello") }))
            .route("/missing", get(|| async { (StatusCode::NOT_FOUND, "nope") }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let origin = spawn_origin().await;
        let fetcher = HttpFetcher::new(HttpFetcherConfig::default()).unwrap();

        let response = fetcher
            .fetch(FetchRequest::get_str(&format!("{}/ok", origin)).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert!(response.ok());
        assert_eq!(&response.body[..], b"hello");
        assert_eq!(response.headers.get("x-origin").unwrap(), "test");
        // hyper stamps every response with a date header
        assert!(response.headers.contains_key(header::DATE));
    }

    #[tokio::test]
    async fn test_fetch_non_success_is_not_an_error() {
        let origin = spawn_origin().await;
        let fetcher = HttpFetcher::new(HttpFetcherConfig::default()).unwrap();

        let response = fetcher
            .fetch(FetchRequest::get_str(&format!("{}/missing", origin)).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert!(!response.ok());
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_is_unavailable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetcher = HttpFetcher::new(HttpFetcherConfig::default()).unwrap();
        let result = fetcher
            .fetch(FetchRequest::get_str(&format!("http://{}/ok", addr)).unwrap())
            .await;

        assert!(matches!(result, Err(ProxyError::Unavailable(_))));
    }

    #[test]
    fn test_get_str_rejects_relative_url() {
        assert!(matches!(
            FetchRequest::get_str("/src/main.js"),
            Err(ProxyError::InvalidRequest(_))
        ));
    }
}
