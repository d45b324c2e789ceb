//! End-to-end pre-caching over real HTTP.
//!
//! Uses wiremock; `expect(n)` is verified when each server is dropped.

use std::sync::Arc;
use std::time::Duration;

use http::{Method, StatusCode};
use swcache_net::{Request, ResourceLoader};
use swcache_sw::{
    CacheStorage, ResponseSource, ServiceWorkerError, ServiceWorkerHost, ServiceWorkerState,
    StaticCacheWorker, WorkerConfig, WorkerGlobalScope,
};
use url::Url;
use wiremock::matchers::{body_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("swcache_sw=debug")
        .with_test_writer()
        .try_init();
}

fn host_for(server: &MockServer, worker: &StaticCacheWorker) -> (ServiceWorkerHost, CacheStorage) {
    let config = WorkerConfig {
        scope: format!("{}/", server.uri()),
        cache_name: worker.cache_name().to_string(),
        assets: worker.assets().to_vec(),
        ..WorkerConfig::default()
    };
    let loader = ResourceLoader::new(config.loader_config()).expect("loader");
    let caches = CacheStorage::new();
    let scope = config.scope_url().unwrap();
    let global = WorkerGlobalScope::new(scope, caches.clone(), Arc::new(loader));
    (ServiceWorkerHost::new(global, worker.dispatch_table()), caches)
}

fn request(server: &MockServer, p: &str) -> Request {
    Request::get(Url::parse(&server.uri()).unwrap().join(p).unwrap())
}

#[tokio::test]
async fn test_precache_then_serve_offline() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("home.html"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/path/to/icon.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x89, 0x50, 0x4e, 0x47]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(ResponseTemplate::new(200).set_body_string("about.html"))
        .expect(2)
        .mount(&server)
        .await;

    let (host, caches) = host_for(&server, &StaticCacheWorker::default());
    host.start().await.unwrap();
    assert_eq!(host.state().await, ServiceWorkerState::Activated);
    assert_eq!(caches.open("static-cache").await.len().await, 2);

    // Served from cache: the "/" and icon mocks stay at one hit each.
    for _ in 0..3 {
        let response = host.fetch(request(&server, "/")).await.unwrap();
        assert_eq!(response.source, ResponseSource::Cache);
        assert_eq!(response.response.text().unwrap(), "home.html");
    }
    let icon = host.fetch(request(&server, "/path/to/icon.png")).await.unwrap();
    assert_eq!(icon.response.bytes().as_ref(), &[0x89, 0x50, 0x4e, 0x47]);

    // Misses hit the network every time.
    for _ in 0..2 {
        let response = host.fetch(request(&server, "/about")).await.unwrap();
        assert_eq!(response.source, ResponseSource::Network);
    }
}

#[tokio::test]
async fn test_post_passes_through_with_body() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("home.html"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_string("name=swcache"))
        .respond_with(ResponseTemplate::new(201).set_body_string("created"))
        .expect(1)
        .mount(&server)
        .await;

    let worker = StaticCacheWorker::new("static-cache", vec!["/".to_string()]);
    let (host, _) = host_for(&server, &worker);
    host.start().await.unwrap();

    let post = Request::new(Method::POST, request(&server, "/").url).body("name=swcache");
    let response = host.fetch(post).await.unwrap();
    assert_eq!(response.source, ResponseSource::Network);
    assert_eq!(response.response.status, StatusCode::CREATED);
    assert_eq!(response.response.text().unwrap(), "created");
}

#[tokio::test]
async fn test_install_fails_on_404() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("home.html"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let worker = StaticCacheWorker::new(
        "static-cache",
        vec!["/".to_string(), "/missing.png".to_string()],
    );
    let (host, caches) = host_for(&server, &worker);

    let err = host.install().await.unwrap_err();
    assert!(matches!(err, ServiceWorkerError::InstallFailed(_)));
    assert!(caches.open("static-cache").await.is_empty().await);
}

#[tokio::test]
async fn test_slow_asset_hits_install_timeout() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let worker = StaticCacheWorker::new("static-cache", vec!["/".to_string()]);
    let (host, _) = host_for(&server, &worker);
    let host = host.with_install_timeout(Duration::from_millis(200));

    let err = host.install().await.unwrap_err();
    assert!(matches!(err, ServiceWorkerError::InstallTimeout(_)));
    assert_eq!(host.state().await, ServiceWorkerState::Redundant);
}
