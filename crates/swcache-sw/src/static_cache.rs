//! The static pre-caching worker: cache assets on install, serve cache first.

use std::sync::Arc;

use swcache_net::Request;
use tracing::debug;

use crate::config::WorkerConfig;
use crate::event::{EventDispatchTable, FetchResponse};
use crate::Result;

/// Cache name used when none is configured.
pub const DEFAULT_CACHE_NAME: &str = "static-cache";

/// Assets pre-cached when none are configured.
pub const DEFAULT_ASSETS: &[&str] = &["/", "/path/to/icon.png"];

/// A worker that pre-caches a fixed asset list into one named cache and
/// answers every request from the caches, falling back to the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticCacheWorker {
    cache_name: String,
    assets: Vec<String>,
}

impl Default for StaticCacheWorker {
    fn default() -> Self {
        Self::new(
            DEFAULT_CACHE_NAME,
            DEFAULT_ASSETS.iter().map(|a| a.to_string()).collect(),
        )
    }
}

impl StaticCacheWorker {
    pub fn new(cache_name: impl Into<String>, assets: Vec<String>) -> Self {
        Self {
            cache_name: cache_name.into(),
            assets,
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(config.cache_name.clone(), config.assets.clone())
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    /// Register the install and fetch handlers.
    pub fn register(&self, table: &mut EventDispatchTable) {
        let worker = Arc::new(self.clone());

        table.on_install(move |global, event| {
            let requests = worker
                .assets
                .iter()
                .map(|asset| global.resolve(asset).map(Request::get))
                .collect::<Result<Vec<_>>>()?;

            let caches = global.caches().clone();
            let fetcher = global.fetcher();
            let cache_name = worker.cache_name.clone();

            event.wait_until(async move {
                let cache = caches.open(&cache_name).await;
                cache.add_all(fetcher.as_ref(), requests).await
            });
            Ok(())
        });

        table.on_fetch(|global, event| {
            let caches = global.caches().clone();
            let fetcher = global.fetcher();
            let request = event.request().clone();

            event.respond_with(async move {
                if let Some(cached) = caches.match_request(&request).await {
                    debug!(url = %request.url, "Cache hit");
                    return Ok(FetchResponse::from_cache(cached));
                }
                debug!(url = %request.url, "Cache miss, fetching from network");
                let response = fetcher.fetch(&request).await?;
                Ok(FetchResponse::from_network(response))
            })
        });
    }

    /// A dispatch table holding only this worker's handlers.
    pub fn dispatch_table(&self) -> EventDispatchTable {
        let mut table = EventDispatchTable::new();
        self.register(&mut table);
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    #[test]
    fn test_defaults() {
        let worker = StaticCacheWorker::default();
        assert_eq!(worker.cache_name(), "static-cache");
        assert_eq!(worker.assets(), ["/", "/path/to/icon.png"]);
    }

    #[test]
    fn test_registers_install_and_fetch() {
        let table = StaticCacheWorker::default().dispatch_table();
        assert!(table.has_listeners(EventKind::Install));
        assert!(table.has_listeners(EventKind::Fetch));
        assert!(!table.has_listeners(EventKind::Activate));
    }

    #[test]
    fn test_from_config() {
        let config = WorkerConfig {
            cache_name: "isolated".to_string(),
            assets: vec!["/app.js".to_string()],
            ..WorkerConfig::default()
        };
        let worker = StaticCacheWorker::from_config(&config);
        assert_eq!(worker.cache_name(), "isolated");
        assert_eq!(worker.assets(), ["/app.js"]);
    }
}
