//! Cache-aside proxy in front of the remote API
//!
//! Only successful (2xx) responses are stored. Errors of any kind go straight
//! back to the caller so a recovering upstream is asked again on the next call.

use crate::proxy::{ProxyError, ProxyResult, Upstream, UpstreamRequest};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use url::Url;

/// Cache key prefix together with the freshness window of its entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNamespace {
    pub name: String,
    pub ttl: Duration,
}

impl CacheNamespace {
    pub fn new(name: impl Into<String>, ttl: Duration) -> Self {
        Self {
            name: name.into(),
            ttl,
        }
    }

    /// Event searches, 5 minutes
    pub fn events() -> Self {
        Self::new("events", Duration::from_secs(300))
    }

    /// Listing endpoints, 1 hour
    pub fn campaigns() -> Self {
        Self::new("campaigns", Duration::from_secs(3600))
    }
}

/// Identity of a request besides its url
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestArgs {
    /// Query parameters appended to the url
    pub query: BTreeMap<String, String>,
    /// JSON body; its presence turns the request into a POST
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl RequestArgs {
    pub fn query<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            query: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) < self.ttl
    }
}

/// Counters about cache usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStatistics {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

pub struct CacheAsideProxy {
    upstream: Arc<dyn Upstream>,
    store: RwLock<HashMap<String, CacheEntry>>,
    /// One gate per key with a fetch in flight
    inflight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheAsideProxy {
    pub fn new(upstream: Arc<dyn Upstream>) -> Self {
        Self {
            upstream,
            store: RwLock::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached value for this request or fetch, store and return it
    pub async fn get_from_cache(
        &self,
        namespace: &CacheNamespace,
        url: &str,
        args: &RequestArgs,
    ) -> ProxyResult<Value> {
        let key = cache_key(&namespace.name, url, args)?;
        if let Some(value) = self.lookup(&key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Cache hit for {}", key);
            return Ok(value);
        }

        let gate = self.gate(&key);
        let result = {
            let _guard = gate.lock().await;
            // another caller may have filled the entry while we waited
            match self.lookup(&key).await {
                Some(value) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    Ok(value)
                }
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!("Cache miss for {}", key);
                    self.fetch_and_store(namespace, &key, url, args).await
                }
            }
        };
        self.release_gate(&key, gate);
        result
    }

    async fn lookup(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        {
            let store = self.store.read().await;
            match store.get(key) {
                Some(entry) if entry.is_fresh(now) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        let mut store = self.store.write().await;
        if store.get(key).is_some_and(|entry| !entry.is_fresh(now)) {
            store.remove(key);
            tracing::debug!("Removed expired cache entry: {}", key);
        }
        None
    }

    async fn fetch_and_store(
        &self,
        namespace: &CacheNamespace,
        key: &str,
        url: &str,
        args: &RequestArgs,
    ) -> ProxyResult<Value> {
        let request = UpstreamRequest {
            url: request_url(url, &args.query)?,
            body: args.body.clone(),
        };
        let response = self.upstream.send(&request).await.map_err(|e| {
            tracing::warn!("Upstream unreachable for {}: {}", request.url, e);
            e
        })?;

        if (200..300).contains(&response.status) {
            let value: Value = serde_json::from_str(&response.body).map_err(|e| {
                ProxyError::InvalidBody {
                    message: e.to_string(),
                }
            })?;
            self.store.write().await.insert(
                key.to_string(),
                CacheEntry {
                    value: value.clone(),
                    stored_at: Instant::now(),
                    ttl: namespace.ttl,
                },
            );
            tracing::debug!("Cached {} (TTL: {:?})", key, namespace.ttl);
            Ok(value)
        } else {
            tracing::warn!("Upstream answered {} for {}", response.status, request.url);
            let body = serde_json::from_str(&response.body)
                .unwrap_or_else(|_| Value::String(response.body.clone()));
            Err(ProxyError::Upstream {
                status: response.status,
                body,
            })
        }
    }

    fn gate(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        match self.inflight.lock() {
            Ok(mut inflight) => Arc::clone(inflight.entry(key.to_string()).or_default()),
            Err(e) => {
                tracing::error!("In-flight registry poisoned: {}", e);
                Arc::new(tokio::sync::Mutex::new(()))
            }
        }
    }

    fn release_gate(&self, key: &str, gate: Arc<tokio::sync::Mutex<()>>) {
        if let Ok(mut inflight) = self.inflight.lock() {
            // registry + ours: nobody else is waiting on this key
            if Arc::strong_count(&gate) <= 2 {
                inflight.remove(key);
            }
        }
    }

    /// Drop every expired entry, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut store = self.store.write().await;
        let before = store.len();
        store.retain(|_, entry| entry.is_fresh(now));
        let removed = before - store.len();
        if removed > 0 {
            tracing::info!("Cleaned up {} expired cache entries", removed);
        }
        removed
    }

    /// Number of stored entries, expired ones included until purged
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> CacheStatistics {
        CacheStatistics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len().await,
        }
    }
}

/// `namespace:sha256(canonical {url, args})`
pub fn cache_key(namespace: &str, url: &str, args: &RequestArgs) -> ProxyResult<String> {
    let identity = serde_json::json!({
        "url": url,
        "args": serde_json::to_value(args).map_err(|e| ProxyError::InvalidUrl {
            message: e.to_string(),
        })?,
    });
    let mut hasher = Sha256::new();
    hasher.update(canonicalize(&identity).to_string());
    Ok(format!("{}:{:x}", namespace, hasher.finalize()))
}

/// Rebuild objects with their keys sorted, recursively
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(fields) => {
            let mut sorted: Vec<(&String, &Value)> = fields.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let mut map = Map::new();
            for (key, value) in sorted {
                map.insert(key.clone(), canonicalize(value));
            }
            Value::Object(map)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

fn request_url(url: &str, query: &BTreeMap<String, String>) -> ProxyResult<String> {
    let mut url = Url::parse(url).map_err(|e| ProxyError::InvalidUrl {
        message: format!("{url}: {e}"),
    })?;
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query.iter());
    }
    Ok(url.into())
}
