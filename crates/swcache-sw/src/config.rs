//! Worker configuration, loaded from TOML.
//!
//! ```toml
//! scope = "https://example.com/"
//! cache_name = "static-cache"
//! assets = ["/", "/path/to/icon.png"]
//! install_timeout_secs = 60
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use swcache_net::LoaderConfig;
use url::Url;

use crate::static_cache::{DEFAULT_ASSETS, DEFAULT_CACHE_NAME};
use crate::{Result, ServiceWorkerError};

/// Configuration for one static-cache worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerConfig {
    /// Absolute URL that asset paths are resolved against.
    pub scope: String,
    /// Name of the cache assets are stored in.
    pub cache_name: String,
    /// Asset paths or URLs to pre-cache at install time.
    pub assets: Vec<String>,
    /// Fail install if it has not finished within this many seconds.
    pub install_timeout_secs: Option<u64>,
    /// User agent for network requests.
    pub user_agent: Option<String>,
    /// Per-request network timeout.
    pub request_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            scope: "http://localhost:8080/".to_string(),
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            assets: DEFAULT_ASSETS.iter().map(|a| a.to_string()).collect(),
            install_timeout_secs: None,
            user_agent: None,
            request_timeout_secs: 30,
        }
    }
}

impl WorkerConfig {
    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ServiceWorkerError::ConfigError(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| ServiceWorkerError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the scope is an absolute http(s) URL, the cache name is set,
    /// and every asset resolves against the scope.
    pub fn validate(&self) -> Result<()> {
        let scope = self.scope_url()?;
        if self.cache_name.trim().is_empty() {
            return Err(ServiceWorkerError::ConfigError(
                "cache_name must not be empty".to_string(),
            ));
        }
        for asset in &self.assets {
            scope.join(asset).map_err(|e| {
                ServiceWorkerError::ConfigError(format!("asset '{asset}' does not resolve: {e}"))
            })?;
        }
        Ok(())
    }

    /// The parsed scope URL.
    pub fn scope_url(&self) -> Result<Url> {
        let url = Url::parse(&self.scope)
            .map_err(|e| ServiceWorkerError::ConfigError(format!("scope '{}': {e}", self.scope)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ServiceWorkerError::ConfigError(format!(
                "scope must be http or https, got '{other}'"
            ))),
        }
    }

    pub fn install_timeout(&self) -> Option<Duration> {
        self.install_timeout_secs.map(Duration::from_secs)
    }

    /// Network loader settings derived from this config.
    pub fn loader_config(&self) -> LoaderConfig {
        let mut loader = LoaderConfig {
            default_timeout: Duration::from_secs(self.request_timeout_secs),
            ..LoaderConfig::default()
        };
        if let Some(ref user_agent) = self.user_agent {
            loader.user_agent = user_agent.clone();
        }
        loader
    }
}
