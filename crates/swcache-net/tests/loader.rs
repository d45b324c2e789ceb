//! Integration tests for ResourceLoader against a wiremock server.

use std::time::Duration;

use http::{HeaderName, HeaderValue, Method, StatusCode};
use swcache_net::{Fetch, LoaderConfig, NetError, Request, ResourceLoader};
use url::Url;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn loader() -> ResourceLoader {
    ResourceLoader::new(LoaderConfig::default()).expect("failed to create loader")
}

fn url(server: &MockServer, p: &str) -> Url {
    Url::parse(&server.uri()).unwrap().join(p).unwrap()
}

#[tokio::test]
async fn test_fetch_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("home.html", "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let response = loader()
        .fetch(&Request::get(url(&server, "/")))
        .await
        .expect("fetch failed");

    assert!(response.ok());
    assert_eq!(response.text().unwrap(), "home.html");
    assert_eq!(response.content_type(), Some("text/html"));
}

#[tokio::test]
async fn test_fetch_error_status_is_not_transport_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let response = loader()
        .fetch(&Request::get(url(&server, "/missing.png")))
        .await
        .expect("404 should still resolve");

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(!response.ok());
}

#[tokio::test]
async fn test_fetch_forwards_request_headers() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/about"))
        .and(header("x-client", "swcache-test"))
        // `header()` splits values on commas, so compare the raw value.
        .and(|req: &wiremock::Request| {
            req.headers
                .get("accept-language")
                .is_some_and(|v| v.as_bytes() == b"en-US,en;q=0.9")
        })
        .respond_with(ResponseTemplate::new(200).set_body_string("about"))
        .expect(1)
        .mount(&server)
        .await;

    let request = Request::get(url(&server, "/about")).header(
        HeaderName::from_static("x-client"),
        HeaderValue::from_static("swcache-test"),
    );
    let response = loader().fetch(&request).await.expect("fetch failed");
    assert!(response.ok(), "mock did not match: {}", response.status);
    assert_eq!(response.text().unwrap(), "about");
}

#[tokio::test]
async fn test_fetch_sends_request_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/form"))
        .and(body_string("q=1"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let request = Request::new(Method::POST, url(&server, "/form")).body("q=1");
    let response = loader().fetch(&request).await.expect("fetch failed");
    assert_eq!(response.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_fetch_timeout() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let request = Request::get(url(&server, "/slow")).timeout(Duration::from_millis(100));
    let result = loader().fetch(&request).await;

    assert!(matches!(result, Err(NetError::Timeout(d)) if d == Duration::from_millis(100)));
}

#[tokio::test]
async fn test_fetch_connection_refused() {
    // Bind and drop a listener so the port is known to be closed.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let uri = format!("http://127.0.0.1:{port}");

    let request = Request::get(Url::parse(&uri).unwrap().join("/").unwrap());
    let result = loader().fetch(&request).await;

    assert!(matches!(result, Err(NetError::HttpError(_))));
}
