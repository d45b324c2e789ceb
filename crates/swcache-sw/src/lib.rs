//! # swcache Service Worker
//!
//! A static pre-caching service worker and the host that drives it.
//!
//! ## Features
//!
//! - **Cache API**: `caches.open()`, `cache.addAll()`, `caches.match()`
//! - **Lifecycle**: install, activate, fetch events with `waitUntil()`
//! - **Fetch Interception**: cache first, network on a miss
//!
//! ## Architecture
//!
//! ```text
//! ServiceWorkerHost
//!     ├── state (Parsed → Installing → Installed → Activating → Activated)
//!     ├── EventDispatchTable
//!     │       ├── install handlers ── InstallEvent.wait_until()
//!     │       ├── activate handlers ─ ActivateEvent.wait_until()
//!     │       └── fetch handlers ──── FetchEvent.respond_with()
//!     └── WorkerGlobalScope
//!             ├── scope URL
//!             ├── CacheStorage (caches)
//!             │       └── Cache
//!             │               └── RequestKey → Response
//!             └── Fetch (network)
//! ```

use std::time::Duration;

use swcache_net::NetError;
use thiserror::Error;

pub mod cache;
pub mod config;
pub mod event;
pub mod scope;
pub mod static_cache;
pub mod worker;

pub use cache::{Cache, CacheStorage, RequestKey};
pub use config::WorkerConfig;
pub use event::{
    ActivateEvent, EventDispatchTable, EventKind, ExtendableEvent, FetchEvent, FetchResponse,
    InstallEvent, ResponseSource,
};
pub use scope::WorkerGlobalScope;
pub use static_cache::{StaticCacheWorker, DEFAULT_ASSETS, DEFAULT_CACHE_NAME};
pub use worker::{ServiceWorkerHost, ServiceWorkerId, ServiceWorkerState};

// ==================== Errors ====================

/// Errors that can occur in service worker operations.
#[derive(Error, Debug, Clone)]
pub enum ServiceWorkerError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Bad response for {url}: status {status}")]
    BadResponse { url: String, status: u16 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("State error: {0}")]
    StateError(String),

    #[error("Install failed: {0}")]
    InstallFailed(#[source] Box<ServiceWorkerError>),

    #[error("Install timed out after {0:?}")]
    InstallTimeout(Duration),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl From<NetError> for ServiceWorkerError {
    fn from(err: NetError) -> Self {
        Self::NetworkError(err.to_string())
    }
}

impl From<url::ParseError> for ServiceWorkerError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

/// Result type alias for service worker operations.
pub type Result<T> = std::result::Result<T, ServiceWorkerError>;
