//! The globals a worker script sees, passed to handlers explicitly.

use std::fmt;
use std::sync::Arc;

use swcache_net::{Fetch, Request, Response};
use url::Url;

use crate::cache::CacheStorage;
use crate::Result;

/// Worker global scope: scope URL, `caches`, and `fetch`.
#[derive(Clone)]
pub struct WorkerGlobalScope {
    scope_url: Url,
    caches: CacheStorage,
    fetcher: Arc<dyn Fetch>,
}

impl WorkerGlobalScope {
    pub fn new(scope_url: Url, caches: CacheStorage, fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            scope_url,
            caches,
            fetcher,
        }
    }

    pub fn scope_url(&self) -> &Url {
        &self.scope_url
    }

    /// The origin's cache storage.
    pub fn caches(&self) -> &CacheStorage {
        &self.caches
    }

    /// Shared handle to the network.
    pub fn fetcher(&self) -> Arc<dyn Fetch> {
        Arc::clone(&self.fetcher)
    }

    /// Resolve a path or URL against the scope.
    pub fn resolve(&self, path: &str) -> Result<Url> {
        Ok(self.scope_url.join(path)?)
    }

    /// Live network fetch.
    pub async fn fetch(&self, request: &Request) -> Result<Response> {
        Ok(self.fetcher.fetch(request).await?)
    }
}

impl fmt::Debug for WorkerGlobalScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerGlobalScope")
            .field("scope_url", &self.scope_url.as_str())
            .field("caches", &self.caches)
            .finish_non_exhaustive()
    }
}
