//! swcache Network Layer
//!
//! This crate provides the network fetch primitive the cache worker falls
//! back to on a miss, and the request/response types it exchanges.

pub mod client;
pub mod error;
pub mod fetcher;

pub use client::{HttpFetcher, HttpFetcherConfig};
pub use error::ProxyError;
pub use fetcher::{FetchRequest, FetchResponse, Fetcher};
