//! Integration tests for the HTTP locator against a mock discovery endpoint.

use std::sync::Arc;
use std::time::Duration;

use locator_core::{Location, Locator, LocatorError};
use locator_http::HttpLocator;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_resolves_from_server_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/discovery"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "servers": [{"address": "10.0.0.1", "port": 9000}]
        })))
        .mount(&server)
        .await;

    let locator = HttpLocator::new(format!("{}/discovery", server.uri())).unwrap();
    let location = locator.locate().await.unwrap();
    assert_eq!(location, Location::new("10.0.0.1", 9000));
}

#[tokio::test]
async fn test_non_success_status_is_bad_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let locator = HttpLocator::new(server.uri()).unwrap();
    let result = locator.locate().await;
    assert_eq!(result, Err(LocatorError::BadResponse { status: 503 }));
}

#[tokio::test]
async fn test_unusable_body_is_malformed_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let locator = HttpLocator::new(server.uri()).unwrap();
    assert_eq!(locator.locate().await, Err(LocatorError::MalformedResponse));
}

#[tokio::test]
async fn test_custom_extractor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("cache.internal"))
        .mount(&server)
        .await;

    let extractor = Arc::new(|data: &[u8]| {
        std::str::from_utf8(data)
            .ok()
            .map(|host| Location::new(host.trim(), 6379))
    });
    let locator = HttpLocator::with_extractor(server.uri(), extractor).unwrap();
    assert_eq!(
        locator.locate().await.unwrap(),
        Location::new("cache.internal", 6379)
    );
}

#[tokio::test]
async fn test_unreachable_endpoint_is_http_error() {
    // Port 9 (discard) on localhost is not expected to serve HTTP
    let locator = HttpLocator::new("http://127.0.0.1:9/discovery").unwrap();
    assert!(matches!(locator.locate().await, Err(LocatorError::Http(_))));
}

#[tokio::test]
async fn test_slow_endpoint_hits_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({
                    "servers": [{"address": "10.0.0.1", "port": 9000}]
                }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let locator = HttpLocator::new(server.uri())
        .unwrap()
        .with_request_timeout(Duration::from_millis(50))
        .unwrap();
    assert!(matches!(locator.locate().await, Err(LocatorError::Http(_))));
}
