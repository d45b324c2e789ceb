//! Service worker host: drives the lifecycle and routes intercepted requests.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use swcache_net::Request;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::event::{ActivateEvent, EventDispatchTable, FetchEvent, FetchResponse, InstallEvent};
use crate::scope::WorkerGlobalScope;
use crate::{Result, ServiceWorkerError};

// ==================== Types ====================

/// Unique identifier for a service worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceWorkerId(u64);

impl ServiceWorkerId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ServiceWorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sw-{}", self.0)
    }
}

/// Service worker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceWorkerState {
    /// Created, no lifecycle event dispatched yet.
    #[default]
    Parsed,
    /// Installing (install event).
    Installing,
    /// Installed but not yet active.
    Installed,
    /// Activating (activate event).
    Activating,
    /// Active and intercepting fetches.
    Activated,
    /// Install failed or unregistered.
    Redundant,
}

impl fmt::Display for ServiceWorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceWorkerState::Parsed => "parsed",
            ServiceWorkerState::Installing => "installing",
            ServiceWorkerState::Installed => "installed",
            ServiceWorkerState::Activating => "activating",
            ServiceWorkerState::Activated => "activated",
            ServiceWorkerState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
struct WorkerStatus {
    state: ServiceWorkerState,
    error: Option<String>,
}

impl WorkerStatus {
    fn set_state(&mut self, state: ServiceWorkerState) {
        self.state = state;
    }
}

// ==================== Host ====================

/// Runs one worker version: its global scope plus its registered handlers.
pub struct ServiceWorkerHost {
    id: ServiceWorkerId,
    global: WorkerGlobalScope,
    table: EventDispatchTable,
    install_timeout: Option<Duration>,
    status: RwLock<WorkerStatus>,
}

impl ServiceWorkerHost {
    /// Create a host in the `Parsed` state.
    pub fn new(global: WorkerGlobalScope, table: EventDispatchTable) -> Self {
        Self {
            id: ServiceWorkerId::new(),
            global,
            table,
            install_timeout: None,
            status: RwLock::new(WorkerStatus {
                state: ServiceWorkerState::Parsed,
                error: None,
            }),
        }
    }

    /// Abort install if its extended lifetime has not settled within `timeout`.
    pub fn with_install_timeout(mut self, timeout: Duration) -> Self {
        self.install_timeout = Some(timeout);
        self
    }

    pub fn id(&self) -> ServiceWorkerId {
        self.id
    }

    pub fn global(&self) -> &WorkerGlobalScope {
        &self.global
    }

    /// Current state.
    pub async fn state(&self) -> ServiceWorkerState {
        self.status.read().await.state
    }

    /// Error that made the worker redundant, if any.
    pub async fn error(&self) -> Option<String> {
        self.status.read().await.error.clone()
    }

    /// Check if active.
    pub async fn is_active(&self) -> bool {
        self.state().await == ServiceWorkerState::Activated
    }

    async fn transition(&self, from: ServiceWorkerState, to: ServiceWorkerState) -> Result<()> {
        let mut status = self.status.write().await;
        if status.state != from {
            return Err(ServiceWorkerError::StateError(format!(
                "cannot move to {to} from {}",
                status.state
            )));
        }
        status.set_state(to);
        Ok(())
    }

    async fn set_state(&self, state: ServiceWorkerState) {
        self.status.write().await.set_state(state);
    }

    /// Dispatch `install` and wait for its extended lifetime to settle.
    ///
    /// On failure the worker becomes redundant and the error is returned.
    pub async fn install(&self) -> Result<()> {
        self.transition(ServiceWorkerState::Parsed, ServiceWorkerState::Installing)
            .await?;
        info!(worker = %self.id, scope = %self.global.scope_url(), "Installing service worker");

        match self.run_install().await {
            Ok(()) => {
                self.set_state(ServiceWorkerState::Installed).await;
                info!(worker = %self.id, "Service worker installed");
                Ok(())
            }
            Err(err) => {
                warn!(worker = %self.id, error = %err, "Service worker install failed");
                let mut status = self.status.write().await;
                status.set_state(ServiceWorkerState::Redundant);
                status.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    async fn run_install(&self) -> Result<()> {
        let mut event = InstallEvent::new();
        self.table
            .dispatch_install(&self.global, &mut event)
            .map_err(|e| ServiceWorkerError::InstallFailed(Box::new(e)))?;

        let settle = event.into_extendable().settle();
        let outcome = match self.install_timeout {
            Some(limit) => tokio::time::timeout(limit, settle)
                .await
                .map_err(|_| ServiceWorkerError::InstallTimeout(limit))?,
            None => settle.await,
        };
        outcome.map_err(|e| ServiceWorkerError::InstallFailed(Box::new(e)))
    }

    /// Dispatch `activate`. Only valid once installed.
    ///
    /// Errors from activate handlers are logged; activation still completes.
    pub async fn activate(&self) -> Result<()> {
        self.transition(ServiceWorkerState::Installed, ServiceWorkerState::Activating)
            .await?;

        let mut event = ActivateEvent::new();
        let outcome = match self.table.dispatch_activate(&self.global, &mut event) {
            Ok(()) => event.into_extendable().settle().await,
            Err(err) => Err(err),
        };
        if let Err(err) = outcome {
            warn!(worker = %self.id, error = %err, "Activate handler failed");
        }

        self.set_state(ServiceWorkerState::Activated).await;
        info!(worker = %self.id, "Service worker activated");
        Ok(())
    }

    /// Install then activate.
    pub async fn start(&self) -> Result<()> {
        self.install().await?;
        self.activate().await
    }

    /// Stop intercepting. Later fetches go straight to the network.
    pub async fn unregister(&self) {
        self.set_state(ServiceWorkerState::Redundant).await;
        info!(worker = %self.id, "Service worker unregistered");
    }

    /// Route one request through the worker.
    pub async fn fetch(&self, request: Request) -> Result<FetchResponse> {
        self.handle_fetch(FetchEvent::new(request)).await
    }

    /// Dispatch a fetch event and produce its response.
    ///
    /// Requests are only intercepted while the worker is activated. When no
    /// handler calls `respond_with`, the request goes to the network.
    pub async fn handle_fetch(&self, mut event: FetchEvent) -> Result<FetchResponse> {
        if !self.is_active().await {
            debug!(
                worker = %self.id,
                url = %event.request().url,
                "Worker not active, passing through"
            );
            let response = self.global.fetch(event.request()).await?;
            return Ok(FetchResponse::from_network(response));
        }

        if let Err(err) = self.table.dispatch_fetch(&self.global, &mut event) {
            warn!(
                worker = %self.id,
                url = %event.request().url,
                error = %err,
                "Fetch handler failed"
            );
        }

        let (request, response, extendable) = event.into_parts();
        if extendable.pending() > 0 {
            tokio::spawn(async move {
                if let Err(err) = extendable.settle().await {
                    warn!(error = %err, "Fetch event wait_until failed");
                }
            });
        }

        match response {
            Some(response) => response.await,
            None => {
                debug!(
                    worker = %self.id,
                    url = %request.url,
                    "No respond_with, default network fetch"
                );
                let response = self.global.fetch(&request).await?;
                Ok(FetchResponse::from_network(response))
            }
        }
    }
}

impl fmt::Debug for ServiceWorkerHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceWorkerHost")
            .field("id", &self.id)
            .field("global", &self.global)
            .field("table", &self.table)
            .field("install_timeout", &self.install_timeout)
            .finish_non_exhaustive()
    }
}
