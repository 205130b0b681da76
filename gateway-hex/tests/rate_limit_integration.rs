//! Integration tests for rate limiting middleware.
//!
//! These tests verify the HTTP-level behavior of rate limiting: 429
//! responses, per-caller buckets, and the paths that are never limited.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use http_body_util::BodyExt;
use tower::ServiceExt;

use fee_rules::FeeRulesRegistry;
use gateway_hex::{OrchestratorSettings, PaymentOrchestrator, inbound::HttpServer};
use gateway_providers::ProviderRegistry;
use gateway_repo::SqliteRepo;
use gateway_types::UserId;

/// Helper to create a test server with a very low rate limit.
async fn create_test_server(requests_per_minute: u32) -> HttpServer<SqliteRepo> {
    // Use in-memory SQLite for tests
    let repo = SqliteRepo::new("sqlite::memory:").await.unwrap();
    let orchestrator = PaymentOrchestrator::new(
        repo,
        Arc::new(FeeRulesRegistry::builtin().unwrap()),
        ProviderRegistry::new(),
        OrchestratorSettings::default(),
    );
    HttpServer::with_rate_limit(Arc::new(orchestrator), requests_per_minute)
}

fn health_request() -> Request<Body> {
    Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap()
}

/// A user-scoped request made on behalf of `user`.
fn api_request(user: UserId) -> Request<Body> {
    Request::builder()
        .uri("/api/balances")
        .header("X-User-Id", user.to_string())
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_rate_limiting_returns_429_when_exceeded() {
    let server = create_test_server(3).await;
    let app = server.router();
    let user = UserId::new();

    for i in 1..=3 {
        let response = app.clone().oneshot(api_request(user)).await.unwrap();
        assert_eq!(
            response.status(),
            StatusCode::OK,
            "Request {} should not be rate limited (quota not yet exceeded)",
            i
        );
    }

    let response = app.clone().oneshot(api_request(user)).await.unwrap();
    assert_eq!(
        response.status(),
        StatusCode::TOO_MANY_REQUESTS,
        "Request should be rate limited after exceeding quota"
    );

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(
        json["error"]
            .as_str()
            .unwrap()
            .contains("Rate limit exceeded")
    );
    assert_eq!(json["code"], 429);
    assert_eq!(json["retry_after_seconds"], 60);
}

#[tokio::test]
async fn test_rate_limiting_health_endpoint_bypassed() {
    let server = create_test_server(1).await;
    let app = server.router();

    for _ in 0..10 {
        let response = app.clone().oneshot(health_request()).await.unwrap();
        assert_eq!(
            response.status(),
            StatusCode::OK,
            "Health endpoint should not be rate limited"
        );
    }
}

#[tokio::test]
async fn test_rate_limiting_webhooks_bypassed() {
    let server = create_test_server(1).await;
    let app = server.router();

    // No adapter is registered, so every call is a 404, but never a 429.
    for _ in 0..5 {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/webhooks/paystack")
            .header("x-paystack-signature", "abc")
            .body(Body::from(r#"{"event":"charge.success"}"#))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn test_rate_limiting_per_user_isolation() {
    let server = create_test_server(1).await;
    let app = server.router();
    let alice = UserId::new();
    let bob = UserId::new();

    let response = app.clone().oneshot(api_request(alice)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.clone().oneshot(api_request(alice)).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let response = app.clone().oneshot(api_request(bob)).await.unwrap();
    assert_eq!(
        response.status(),
        StatusCode::OK,
        "Bob should have a separate quota"
    );
}

#[tokio::test]
async fn test_rate_limiting_response_format() {
    let server = create_test_server(1).await;
    let app = server.router();
    let user = UserId::new();

    let _ = app.clone().oneshot(api_request(user)).await;
    let response = app.clone().oneshot(api_request(user)).await.unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("application/json"));

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json.get("error").is_some(), "Response should have 'error' field");
    assert!(
        json.get("retry_after_seconds").is_some(),
        "Response should have 'retry_after_seconds' field"
    );
}
