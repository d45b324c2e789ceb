//! In-memory network used by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use http::StatusCode;
use swcache_net::{Fetch, NetError, Request, Response};
use swcache_sw::{
    CacheStorage, ServiceWorkerHost, StaticCacheWorker, WorkerGlobalScope,
};
use url::Url;

pub const SCOPE: &str = "https://example.com/";

/// Serves canned responses by path and records every request it sees.
/// Unrouted paths fail like an unreachable host.
#[derive(Default)]
pub struct MockNetwork {
    routes: Mutex<HashMap<String, (u16, String)>>,
    calls: Mutex<Vec<String>>,
}

impl MockNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn route(&self, path: &str, status: u16, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, body.to_string()));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl Fetch for MockNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetError> {
        let path = request.url.path().to_string();
        self.calls.lock().unwrap().push(path.clone());

        let route = self.routes.lock().unwrap().get(&path).cloned();
        match route {
            Some((status, body)) => {
                let status = StatusCode::from_u16(status)
                    .map_err(|e| NetError::RequestFailed(e.to_string()))?;
                Ok(Response::new(request.url.clone(), status).with_body(body))
            }
            None => Err(NetError::RequestFailed(format!(
                "connection refused: {}",
                request.url
            ))),
        }
    }
}

pub fn url(path: &str) -> Url {
    Url::parse(SCOPE).unwrap().join(path).unwrap()
}

pub fn get(path: &str) -> Request {
    Request::get(url(path))
}

pub fn global(caches: &CacheStorage, network: &Arc<MockNetwork>) -> WorkerGlobalScope {
    WorkerGlobalScope::new(Url::parse(SCOPE).unwrap(), caches.clone(), network.clone())
}

pub fn static_host(
    worker: &StaticCacheWorker,
    caches: &CacheStorage,
    network: &Arc<MockNetwork>,
) -> ServiceWorkerHost {
    ServiceWorkerHost::new(global(caches, network), worker.dispatch_table())
}

pub fn assets(paths: &[&str]) -> Vec<String> {
    paths.iter().map(|p| p.to_string()).collect()
}
