//! Server-side caching proxy for the remote CRM API

pub mod cache;
pub mod error;
pub mod upstream;

pub use cache::{cache_key, CacheAsideProxy, CacheNamespace, CacheStatistics, RequestArgs};
pub use error::{ProxyError, ProxyResult};
pub use upstream::{Credentials, HttpUpstream, Upstream, UpstreamRequest, UpstreamResponse};
