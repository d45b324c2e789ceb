//! Cache API: named request/response stores.

use std::fmt;
use std::sync::Arc;

use futures::future::try_join_all;
use hashbrown::{HashMap, HashSet};
use http::Method;
use swcache_net::{Fetch, Request, Response};
use tokio::sync::RwLock;
use tracing::{debug, trace, warn};
use url::Url;

use crate::{Result, ServiceWorkerError};

// ==================== Request Key ====================

/// Identity of a cached request: method plus URL without fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub method: Method,
    pub url: String,
}

impl RequestKey {
    pub fn new(method: Method, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self {
            method,
            url: url.into(),
        }
    }
}

impl From<&Request> for RequestKey {
    fn from(request: &Request) -> Self {
        Self::new(request.method.clone(), &request.url)
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

// ==================== Cache ====================

/// Handle to one named cache. Clones share the same entries.
#[derive(Debug, Clone)]
pub struct Cache {
    name: Arc<str>,
    entries: Arc<RwLock<HashMap<RequestKey, Response>>>,
}

impl Cache {
    /// Create a new, empty cache.
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Cache name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Match a request by exact identity.
    pub async fn match_request(&self, request: &Request) -> Option<Response> {
        let key = RequestKey::from(request);
        self.entries
            .read()
            .await
            .get(&key)
            .cloned()
    }

    /// Store a response, replacing any entry with the same identity.
    pub async fn put(&self, request: &Request, response: Response) -> Result<()> {
        check_storable(request)?;
        let key = RequestKey::from(request);
        trace!(cache = %self.name, key = %key, "Cache put");
        self.entries.write().await.insert(key, response);
        Ok(())
    }

    /// Fetch a request and store the response.
    pub async fn add(&self, fetcher: &dyn Fetch, request: Request) -> Result<()> {
        self.add_all(fetcher, vec![request]).await
    }

    /// Fetch every request and store all responses.
    ///
    /// Requests are fetched concurrently. If any fetch fails or any response
    /// is not OK, nothing is stored. A batch naming the same request twice is
    /// rejected before anything is fetched.
    pub async fn add_all(&self, fetcher: &dyn Fetch, requests: Vec<Request>) -> Result<()> {
        let mut seen = HashSet::with_capacity(requests.len());
        for request in &requests {
            check_storable(request)?;
            let key = RequestKey::from(request);
            if !seen.insert(key.clone()) {
                return Err(ServiceWorkerError::CacheError(format!(
                    "duplicate request in batch: {key}"
                )));
            }
        }

        let fetched = try_join_all(requests.into_iter().map(|request| async move {
            let response = fetcher.fetch(&request).await.map_err(|e| {
                warn!(url = %request.url, error = %e, "Bulk add fetch failed");
                ServiceWorkerError::from(e)
            })?;
            if !response.ok() {
                warn!(url = %request.url, status = %response.status, "Bulk add got bad response");
                return Err(ServiceWorkerError::BadResponse {
                    url: request.url.to_string(),
                    status: response.status.as_u16(),
                });
            }
            Ok((RequestKey::from(&request), response))
        }))
        .await?;

        let count = fetched.len();
        let mut entries = self.entries.write().await;
        for (key, response) in fetched {
            entries.insert(key, response);
        }
        debug!(cache = %self.name, count, "Bulk add stored responses");
        Ok(())
    }

    /// Delete the entry for a request.
    pub async fn delete(&self, request: &Request) -> bool {
        self.entries
            .write()
            .await
            .remove(&RequestKey::from(request))
            .is_some()
    }

    /// All stored request identities, sorted by URL then method.
    pub async fn keys(&self) -> Vec<RequestKey> {
        let mut keys: Vec<RequestKey> = self.entries.read().await.keys().cloned().collect();
        keys.sort_by(|a, b| {
            a.url
                .cmp(&b.url)
                .then_with(|| a.method.as_str().cmp(b.method.as_str()))
        });
        keys
    }

    /// Number of entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache has no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

fn check_storable(request: &Request) -> Result<()> {
    if request.method != Method::GET {
        return Err(ServiceWorkerError::CacheError(format!(
            "request method '{}' is unsupported",
            request.method
        )));
    }
    match request.url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ServiceWorkerError::CacheError(format!(
            "request scheme '{scheme}' is unsupported"
        ))),
    }
}

// ==================== Cache Storage ====================

#[derive(Debug, Default)]
struct StorageInner {
    caches: HashMap<String, Cache>,
    /// Names in creation order.
    order: Vec<String>,
}

/// Cache storage (the `caches` global). Clones share the same caches.
#[derive(Debug, Clone, Default)]
pub struct CacheStorage {
    inner: Arc<RwLock<StorageInner>>,
}

impl CacheStorage {
    /// Create new cache storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a cache (creates if doesn't exist).
    pub async fn open(&self, name: &str) -> Cache {
        let mut inner = self.inner.write().await;
        if let Some(cache) = inner.caches.get(name) {
            return cache.clone();
        }
        debug!(cache = name, "Creating cache");
        let cache = Cache::new(name);
        inner.caches.insert(name.to_string(), cache.clone());
        inner.order.push(name.to_string());
        cache
    }

    /// Check if cache exists.
    pub async fn has(&self, name: &str) -> bool {
        self.inner.read().await.caches.contains_key(name)
    }

    /// Delete a cache.
    pub async fn delete(&self, name: &str) -> bool {
        let mut inner = self.inner.write().await;
        if inner.caches.remove(name).is_some() {
            inner.order.retain(|n| n != name);
            true
        } else {
            false
        }
    }

    /// All cache names in creation order.
    pub async fn keys(&self) -> Vec<String> {
        self.inner.read().await.order.clone()
    }

    /// Match across all caches in creation order.
    pub async fn match_request(&self, request: &Request) -> Option<Response> {
        let caches: Vec<Cache> = {
            let inner = self.inner.read().await;
            inner
                .order
                .iter()
                .filter_map(|name| inner.caches.get(name).cloned())
                .collect()
        };

        for cache in caches {
            if let Some(response) = cache.match_request(request).await {
                trace!(cache = cache.name(), url = %request.url, "Storage match");
                return Some(response);
            }
        }
        None
    }
}
