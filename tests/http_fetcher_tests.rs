//! Integration tests for HttpFetcher.
//!
//! Uses wiremock for HTTP mocking. Two mock servers stand in for the
//! application origin and a third-party host.

use std::time::Duration;

use shell_cache::cache::request::{Request, RequestMode};
use shell_cache::cache::response::ResponseType;
use shell_cache::config::NetworkConfig;
use shell_cache::error::FetchError;
use shell_cache::network::fetcher::{Fetcher, HttpFetcher};
use url::Url;
use wiremock::matchers::{body_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher_for(origin: &MockServer, timeout_secs: Option<u64>) -> HttpFetcher {
    let config = NetworkConfig {
        origin: origin.uri(),
        request_timeout_secs: timeout_secs,
    };
    HttpFetcher::new(Url::parse(&origin.uri()).unwrap(), &config).unwrap()
}

fn at(server: &MockServer, p: &str) -> Url {
    Url::parse(&server.uri()).unwrap().join(p).unwrap()
}

#[tokio::test]
async fn test_same_origin_is_basic() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/index.html"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .mount(&origin)
        .await;

    let fetcher = fetcher_for(&origin, None);
    let response = fetcher
        .fetch(&Request::navigate(at(&origin, "/index.html")))
        .await
        .expect("fetch failed");

    assert_eq!(response.status, 200);
    assert_eq!(response.response_type, ResponseType::Basic);
    assert_eq!(response.body.as_ref(), b"<html></html>");
    assert_eq!(response.header("content-type"), Some("text/html"));
}

#[tokio::test]
async fn test_cross_origin_redirect_is_not_basic() {
    let origin = MockServer::start().await;
    let cdn = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vendor.js"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", at(&cdn, "/vendor.js").as_str()),
        )
        .mount(&origin)
        .await;
    Mock::given(method("GET"))
        .and(path("/vendor.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string("vendor()"))
        .mount(&cdn)
        .await;

    let fetcher = fetcher_for(&origin, None);

    let response = fetcher
        .fetch(&Request::get(at(&origin, "/vendor.js")))
        .await
        .expect("fetch failed");
    assert_eq!(response.response_type, ResponseType::Opaque);

    let cors = fetcher
        .fetch(&Request::get(at(&origin, "/vendor.js")).with_mode(RequestMode::Cors))
        .await;
    assert!(matches!(cors, Err(FetchError::CorsRejected(_))));
}

#[tokio::test]
async fn test_error_status_is_not_a_fetch_error() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.js"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&origin)
        .await;

    let fetcher = fetcher_for(&origin, None);
    let response = fetcher
        .fetch(&Request::get(at(&origin, "/missing.js")))
        .await
        .expect("404 is still a response");
    assert_eq!(response.status, 404);
    assert!(!response.ok());
}

#[tokio::test]
async fn test_cross_origin_no_cors_is_opaque() {
    let origin = MockServer::start().await;
    let cdn = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/lib.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string("lib()"))
        .mount(&cdn)
        .await;

    let fetcher = fetcher_for(&origin, None);
    let response = fetcher
        .fetch(&Request::get(at(&cdn, "/lib.js")))
        .await
        .expect("fetch failed");
    assert_eq!(response.response_type, ResponseType::Opaque);
}

#[tokio::test]
async fn test_cross_origin_cors_requires_permission() {
    let origin = MockServer::start().await;
    let api = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/allowed.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{}")
                .insert_header("access-control-allow-origin", "*"),
        )
        .mount(&api)
        .await;
    Mock::given(method("GET"))
        .and(path("/denied.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&api)
        .await;

    let fetcher = fetcher_for(&origin, None);

    let allowed = fetcher
        .fetch(&Request::get(at(&api, "/allowed.json")).with_mode(RequestMode::Cors))
        .await
        .expect("fetch failed");
    assert_eq!(allowed.response_type, ResponseType::Cors);

    let denied = fetcher
        .fetch(&Request::get(at(&api, "/denied.json")).with_mode(RequestMode::Cors))
        .await;
    assert!(matches!(denied, Err(FetchError::CorsRejected(_))));
}

#[tokio::test]
async fn test_post_body_is_forwarded() {
    let origin = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/save"))
        .and(body_string("{\"note\":1}"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&origin)
        .await;

    let fetcher = fetcher_for(&origin, None);
    let response = fetcher
        .fetch(
            &Request::get(at(&origin, "/api/save"))
                .with_method("POST")
                .with_mode(RequestMode::SameOrigin)
                .with_body("{\"note\":1}"),
        )
        .await
        .expect("fetch failed");
    assert_eq!(response.status, 201);
}

#[tokio::test]
async fn test_timeout_is_reported() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.js"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&origin)
        .await;

    let fetcher = fetcher_for(&origin, Some(1));
    let result = fetcher.fetch(&Request::get(at(&origin, "/slow.js"))).await;
    assert!(matches!(result, Err(FetchError::Timeout(d)) if d == Duration::from_secs(1)));
}

#[tokio::test]
async fn test_unreachable_origin_is_network_error() {
    let origin = Url::parse("http://127.0.0.1:9/").unwrap();
    let fetcher = HttpFetcher::new(origin.clone(), &NetworkConfig::default()).unwrap();

    let result = fetcher.fetch(&Request::get(origin.join("/app.js").unwrap())).await;
    assert!(matches!(result, Err(FetchError::Network(_))));
}
