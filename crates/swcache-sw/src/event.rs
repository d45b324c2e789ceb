//! Lifecycle and fetch events, and the table handlers are registered in.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{try_join_all, BoxFuture, FutureExt};
use swcache_net::{Request, Response};
use tracing::trace;

use crate::scope::WorkerGlobalScope;
use crate::{Result, ServiceWorkerError};

/// Completion signal registered through `wait_until`.
pub type ExtendFuture = BoxFuture<'static, Result<()>>;

/// Response promise registered through `respond_with`.
pub type ResponseFuture = BoxFuture<'static, Result<FetchResponse>>;

// ==================== Extendable Event ====================

/// An event whose lifetime can be extended until registered work settles.
#[derive(Default)]
pub struct ExtendableEvent {
    pending: Vec<ExtendFuture>,
}

impl ExtendableEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the event alive until `work` completes. Its error fails the event.
    pub fn wait_until<F>(&mut self, work: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.pending.push(work.boxed());
    }

    /// Number of registered lifetime extensions.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Await every registered extension; the first error wins.
    pub async fn settle(self) -> Result<()> {
        try_join_all(self.pending).await.map(|_| ())
    }
}

impl fmt::Debug for ExtendableEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendableEvent")
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// The `install` lifecycle event.
#[derive(Debug, Default)]
pub struct InstallEvent {
    extendable: ExtendableEvent,
}

impl InstallEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold the worker in `installing` until `work` completes.
    pub fn wait_until<F>(&mut self, work: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.extendable.wait_until(work);
    }

    pub fn into_extendable(self) -> ExtendableEvent {
        self.extendable
    }
}

/// The `activate` lifecycle event.
#[derive(Debug, Default)]
pub struct ActivateEvent {
    extendable: ExtendableEvent,
}

impl ActivateEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold the worker in `activating` until `work` completes.
    pub fn wait_until<F>(&mut self, work: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.extendable.wait_until(work);
    }

    pub fn into_extendable(self) -> ExtendableEvent {
        self.extendable
    }
}

// ==================== Fetch Event ====================

/// Where a response handed to the page came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
}

/// Response produced for an intercepted request.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub response: Response,
    pub source: ResponseSource,
}

impl FetchResponse {
    /// Wrap a response served from a cache.
    pub fn from_cache(response: Response) -> Self {
        Self {
            response,
            source: ResponseSource::Cache,
        }
    }

    /// Wrap a response fetched from the network.
    pub fn from_network(response: Response) -> Self {
        Self {
            response,
            source: ResponseSource::Network,
        }
    }

    pub fn from_cache_hit(&self) -> bool {
        self.source == ResponseSource::Cache
    }
}

/// A fetch event for one intercepted request.
pub struct FetchEvent {
    request: Request,
    response: Option<ResponseFuture>,
    extendable: ExtendableEvent,
}

impl FetchEvent {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            response: None,
            extendable: ExtendableEvent::new(),
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Provide the response for this request. May be called once.
    pub fn respond_with<F>(&mut self, response: F) -> Result<()>
    where
        F: Future<Output = Result<FetchResponse>> + Send + 'static,
    {
        if self.response.is_some() {
            return Err(ServiceWorkerError::StateError(
                "respond_with() already called for this fetch event".to_string(),
            ));
        }
        self.response = Some(response.boxed());
        Ok(())
    }

    /// Whether a handler has already called `respond_with`.
    pub fn responded(&self) -> bool {
        self.response.is_some()
    }

    /// Extend the event's lifetime past the response.
    pub fn wait_until<F>(&mut self, work: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.extendable.wait_until(work);
    }

    pub(crate) fn into_parts(self) -> (Request, Option<ResponseFuture>, ExtendableEvent) {
        (self.request, self.response, self.extendable)
    }
}

impl fmt::Debug for FetchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchEvent")
            .field("url", &self.request.url.as_str())
            .field("method", &self.request.method)
            .field("responded", &self.response.is_some())
            .finish()
    }
}

// ==================== Dispatch Table ====================

/// Event types a worker can listen for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Install,
    Activate,
    Fetch,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Install => write!(f, "install"),
            EventKind::Activate => write!(f, "activate"),
            EventKind::Fetch => write!(f, "fetch"),
        }
    }
}

pub type InstallHandler =
    Arc<dyn Fn(&WorkerGlobalScope, &mut InstallEvent) -> Result<()> + Send + Sync>;
pub type ActivateHandler =
    Arc<dyn Fn(&WorkerGlobalScope, &mut ActivateEvent) -> Result<()> + Send + Sync>;
pub type FetchHandler =
    Arc<dyn Fn(&WorkerGlobalScope, &mut FetchEvent) -> Result<()> + Send + Sync>;

/// Registered event handlers, run in registration order.
#[derive(Clone, Default)]
pub struct EventDispatchTable {
    install: Vec<InstallHandler>,
    activate: Vec<ActivateHandler>,
    fetch: Vec<FetchHandler>,
}

impl EventDispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_install<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&WorkerGlobalScope, &mut InstallEvent) -> Result<()> + Send + Sync + 'static,
    {
        self.install.push(Arc::new(handler));
        self
    }

    pub fn on_activate<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&WorkerGlobalScope, &mut ActivateEvent) -> Result<()> + Send + Sync + 'static,
    {
        self.activate.push(Arc::new(handler));
        self
    }

    pub fn on_fetch<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&WorkerGlobalScope, &mut FetchEvent) -> Result<()> + Send + Sync + 'static,
    {
        self.fetch.push(Arc::new(handler));
        self
    }

    pub fn has_listeners(&self, kind: EventKind) -> bool {
        match kind {
            EventKind::Install => !self.install.is_empty(),
            EventKind::Activate => !self.activate.is_empty(),
            EventKind::Fetch => !self.fetch.is_empty(),
        }
    }

    /// Run install handlers; the first handler error stops dispatch.
    pub fn dispatch_install(
        &self,
        global: &WorkerGlobalScope,
        event: &mut InstallEvent,
    ) -> Result<()> {
        trace!(handlers = self.install.len(), "Dispatching install");
        self.install.iter().try_for_each(|handler| handler(global, event))
    }

    /// Run activate handlers; the first handler error stops dispatch.
    pub fn dispatch_activate(
        &self,
        global: &WorkerGlobalScope,
        event: &mut ActivateEvent,
    ) -> Result<()> {
        trace!(handlers = self.activate.len(), "Dispatching activate");
        self.activate.iter().try_for_each(|handler| handler(global, event))
    }

    /// Run fetch handlers; the first handler error stops dispatch.
    pub fn dispatch_fetch(
        &self,
        global: &WorkerGlobalScope,
        event: &mut FetchEvent,
    ) -> Result<()> {
        trace!(
            handlers = self.fetch.len(),
            url = %event.request().url,
            "Dispatching fetch"
        );
        self.fetch.iter().try_for_each(|handler| handler(global, event))
    }
}

impl fmt::Debug for EventDispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatchTable")
            .field("install", &self.install.len())
            .field("activate", &self.activate.len())
            .field("fetch", &self.fetch.len())
            .finish()
    }
}
