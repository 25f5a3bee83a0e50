mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::*;
use serde_json::json;

/// Tight limits for exercising the admission layer on its own.
fn tight_config() -> fispq::config::Config {
    let mut config = test_config();
    config.security.rate_limits.login.limit = 3;
    config.security.rate_limits.login.window_seconds = 60;
    config
}

fn login_attempt(ip: &str) -> Request<Body> {
    let payload = json!({ "username": "admin", "password": "senha-errada" }).to_string();
    Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header("user-agent", TEST_AGENT)
        .header("x-forwarded-for", ip)
        .header("content-type", "application/json")
        .header("content-length", payload.len().to_string())
        .body(Body::from(payload))
        .unwrap()
}

#[tokio::test]
async fn login_rate_limit_rejects_the_n_plus_first_attempt() {
    let app = spawn_app_with(tight_config()).await;

    for _ in 0..3 {
        let (status, _) = send(&app, login_attempt("198.51.100.7")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // The fourth attempt never reaches credential verification
    let response = app
        .clone()
        .oneshot_owned(login_attempt("198.51.100.7"))
        .await;
    assert_eq!(response.0, StatusCode::TOO_MANY_REQUESTS);
    assert!(response.1.headers.contains_key("retry-after"));
    assert!(response.2["retry_after"].as_u64().unwrap() >= 1);

    // Another address still has its own budget
    let (status, _) = send(&app, login_attempt("198.51.100.8")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rate_limit_applies_before_authentication() {
    let mut config = test_config();
    config.security.rate_limits.default.limit = 2;
    let app = spawn_app_with(config).await;

    // Unauthenticated requests: the first two fail on credentials, the
    // third on admission
    for _ in 0..2 {
        let (status, _) = send(&app, request("GET", "/api/products", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
    let (status, _) = send(&app, request("GET", "/api/products", None, None)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn injection_signature_in_body_is_rejected_before_business_logic() {
    let app = spawn_app().await;

    // No token at all: the refusal proves the request died ahead of
    // authentication, not inside the login handler
    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "username": "x' union select senha from users", "password": "x" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    // The response does not reveal which later check would have failed
    let message = body["error"].as_str().unwrap();
    assert!(!message.to_lowercase().contains("injection"));
    assert!(!message.to_lowercase().contains("password"));
}

#[tokio::test]
async fn injection_signature_in_query_is_rejected_on_any_route() {
    let app = spawn_app().await;

    let (status, _) = send(
        &app,
        request(
            "GET",
            "/api/products/search?by=codigo&q=1%20union%20select%20*",
            None,
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let (status, _) = send(
        &app,
        request("GET", "/api/health?probe=drop%20table%20users", None, None),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn strikes_escalate_to_a_timed_block() {
    let mut config = test_config();
    config.security.abuse.strike_threshold = 2;
    let app = spawn_app_with(config).await;

    let agentless = |ip: &str| {
        Request::builder()
            .method("GET")
            .uri("/api/health")
            .header("x-forwarded-for", ip.to_string())
            .body(Body::empty())
            .unwrap()
    };

    // First strike passes through; the second reaches the threshold
    let (status, _) = send(&app, agentless("192.0.2.99")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, agentless("192.0.2.99")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body["retry_after"].as_u64().unwrap() > 0);

    // Once blocked, even well-formed requests from the address are refused
    let blocked = Request::builder()
        .method("GET")
        .uri("/api/health")
        .header("user-agent", TEST_AGENT)
        .header("x-forwarded-for", "192.0.2.99")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, blocked).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    // Other addresses are unaffected
    let (status, _) = send(&app, request("GET", "/api/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn burst_on_sensitive_paths_earns_a_block() {
    let mut config = test_config();
    config.security.abuse.burst_limit = 5;
    config.security.abuse.strike_threshold = 1;
    let app = spawn_app_with(config).await;

    for _ in 0..5 {
        let (status, _) = send(&app, request("GET", "/api/products", None, None)).await;
        // Unauthenticated, but admitted by the abuse filter
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, _) = send(&app, request("GET", "/api/products", None, None)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

trait OneshotOwned {
    async fn oneshot_owned(
        self,
        req: Request<Body>,
    ) -> (StatusCode, axum::http::response::Parts, serde_json::Value);
}

impl OneshotOwned for axum::Router {
    async fn oneshot_owned(
        self,
        req: Request<Body>,
    ) -> (StatusCode, axum::http::response::Parts, serde_json::Value) {
        use http_body_util::BodyExt;
        use tower::ServiceExt;

        let response = self.oneshot(req).await.unwrap();
        let (parts, body) = response.into_parts();
        let bytes = body.collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (parts.status, parts, json)
    }
}
