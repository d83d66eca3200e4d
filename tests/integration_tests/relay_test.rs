//! CORS relay against a mock upstream

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use cosmic_birthday::config::RelayConfig;
use cosmic_birthday::relay::{build_router, RelayServer, RelayState};
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{body_string, header as header_is, method, path, query_param};
use wiremock::{Match, Mock, MockServer, ResponseTemplate};

/// Matches requests that do not carry `name`
struct WithoutHeader(&'static str);

impl Match for WithoutHeader {
    fn matches(&self, request: &wiremock::Request) -> bool {
        !request.headers.contains_key(self.0)
    }
}

fn router() -> axum::Router {
    build_router(RelayState::new(Duration::from_secs(5)).unwrap())
}

#[tokio::test]
async fn test_relays_get_with_cors() {
    let upstream = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/moon/phases/year"))
        .and(query_param("year", "2024"))
        .and(header_is("accept", "application/json"))
        .and(WithoutHeader("origin"))
        .and(WithoutHeader("referer"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("access-control-allow-origin", "https://usno.example")
                .insert_header("content-type", "application/json")
                .set_body_string(r#"{"phasedata":[]}"#),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let request = Request::builder()
        .uri(format!("/{}/api/moon/phases/year?year=2024", upstream.uri()))
        .header("origin", "http://localhost:3000")
        .header("referer", "http://localhost:3000/app")
        .header("accept", "application/json")
        .body(Body::empty())
        .unwrap();

    let response = router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], br#"{"phasedata":[]}"#);
}

#[tokio::test]
async fn test_relays_post_body_and_status() {
    let upstream = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/submit"))
        .and(body_string("year=2024"))
        .respond_with(ResponseTemplate::new(201).set_body_string("created"))
        .expect(1)
        .mount(&upstream)
        .await;

    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such page"))
        .mount(&upstream)
        .await;

    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/{}/submit", upstream.uri()))
        .body(Body::from("year=2024"))
        .unwrap();
    let response = router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // Upstream errors pass through unchanged
    let request = Request::builder()
        .uri(format!("/{}/gone", upstream.uri()))
        .body(Body::empty())
        .unwrap();
    let response = router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"no such page");
}

#[tokio::test]
async fn test_preflight_answered_locally() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/https://aa.usno.navy.mil/api/moon/phases/year")
        .body(Body::empty())
        .unwrap();

    let response = router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
}

#[tokio::test]
async fn test_bad_target_and_unreachable_upstream() {
    let request = Request::builder()
        .uri("/not-a-url")
        .body(Body::empty())
        .unwrap();
    let response = router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .uri("/http://127.0.0.1:1/api")
        .body(Body::empty())
        .unwrap();
    let response = router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().starts_with("Upstream request failed"));
}

#[tokio::test]
async fn test_server_stops_on_shutdown_signal() {
    let config = RelayConfig {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        upstream_timeout_secs: 5,
    };
    let server = RelayServer::new(&config).unwrap();

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        server.start_with_shutdown(async {}),
    )
    .await;

    assert!(matches!(result, Ok(Ok(()))));
}
