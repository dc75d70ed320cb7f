//! Stub network and fixtures shared by the worker tests

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use http::{HeaderMap, HeaderValue, StatusCode, header};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use swcache_proxy::{FetchRequest, FetchResponse, Fetcher, ProxyError};
use swcache_storage::MemoryCacheStorage;
use url::Url;

use crate::clock::{Clock, ManualClock};
use crate::config::WorkerConfig;
use crate::worker::CacheWorker;

pub const SCOPE: &str = "http://localhost:5173/";

enum Route {
    Respond { status: StatusCode, body: Bytes },
    Fail,
}

/// Network stub that answers from a route table and stamps a `date` header
/// from the shared manual clock
pub struct StubFetcher {
    clock: Arc<ManualClock>,
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            routes: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn respond(&self, url: &str, status: u16, body: &'static str) {
        self.routes.lock().insert(
            url.to_string(),
            Route::Respond {
                status: StatusCode::from_u16(status).unwrap(),
                body: Bytes::from_static(body.as_bytes()),
            },
        );
    }

    pub fn fail(&self, url: &str) {
        self.routes.lock().insert(url.to_string(), Route::Fail);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == url).count()
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, ProxyError> {
        let url = request.url.to_string();
        self.calls.lock().push(url.clone());

        let (status, body) = match self.routes.lock().get(&url) {
            Some(Route::Respond { status, body }) => (*status, body.clone()),
            Some(Route::Fail) => return Err(ProxyError::Unavailable(url)),
            None => (StatusCode::NOT_FOUND, Bytes::new()),
        };

        let mut headers = HeaderMap::new();
        let date = httpdate::fmt_http_date(SystemTime::from(self.clock.now()));
        headers.insert(header::DATE, HeaderValue::from_str(&date).unwrap());

        Ok(FetchResponse {
            url: request.url,
            status,
            headers,
            body,
        })
    }
}

/// A worker over fresh in-memory storage, a stub network and a manual clock
pub struct Fixture {
    pub storage: Arc<MemoryCacheStorage>,
    pub fetcher: Arc<StubFetcher>,
    pub clock: Arc<ManualClock>,
}

impl Fixture {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        ));
        Self {
            storage: Arc::new(MemoryCacheStorage::new()),
            fetcher: Arc::new(StubFetcher::new(clock.clone())),
            clock,
        }
    }

    pub fn config(&self, version: u32) -> WorkerConfig {
        WorkerConfig::new(
            "my-site-cache",
            version,
            Url::parse(SCOPE).unwrap(),
            Duration::from_secs(6),
        )
    }

    pub fn worker(&self, config: WorkerConfig) -> CacheWorker {
        CacheWorker::new(config, self.storage.clone(), self.fetcher.clone())
            .unwrap()
            .with_clock(self.clock.clone())
    }
}

pub fn url(path: &str) -> String {
    format!("{}{}", SCOPE, path.trim_start_matches('/'))
}
