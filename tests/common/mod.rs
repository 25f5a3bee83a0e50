#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use bytes::Bytes;
use http_body_util::BodyExt;
use std::collections::HashMap;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};
use tower::ServiceExt;

use fispq::clients::storage::{ObjectStorage, StorageError};
use fispq::config::Config;
use fispq::state::SharedState;

/// Admin account seeded by the initial migration.
pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "password";

/// A plausible agent so functional tests do not collect strikes.
pub const TEST_AGENT: &str = "fispq-integration-tests/1.0 (tower oneshot)";

pub const TEST_IP: &str = "203.0.113.10";

/// In-memory stand-in for the S3 client.
#[derive(Default)]
pub struct MockStorage {
    pub objects: Mutex<HashMap<String, Bytes>>,
    pub unhealthy: AtomicBool,
}

impl MockStorage {
    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn set_unhealthy(&self) {
        self.unhealthy.store(true, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl ObjectStorage for MockStorage {
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        if self.unhealthy.load(Ordering::SeqCst) {
            return Err(StorageError::Transport("connection refused".to_string()));
        }
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), body);
        Ok(format!("https://storage.test/fispq-docs/{key}"))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        if self.unhealthy.load(Ordering::SeqCst) {
            return Err(StorageError::Transport("connection refused".to_string()));
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn head_bucket(&self) -> bool {
        !self.unhealthy.load(Ordering::SeqCst)
    }
}

/// Config for functional tests: in-memory database, admission limits wide
/// open so they never interfere. The security tests build their own tight
/// configs instead.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.general.database_url = "sqlite::memory:".to_string();
    // A pooled in-memory sqlite gives every connection its own database;
    // one connection keeps state coherent across requests.
    config.general.max_db_connections = 1;
    config.general.min_db_connections = 1;
    config.security.rate_limits.default.limit = 10_000;
    config.security.rate_limits.login.limit = 10_000;
    config.security.rate_limits.register.limit = 10_000;
    config.security.rate_limits.upload.limit = 10_000;
    config.security.rate_limits.delete.limit = 10_000;
    config.security.rate_limits.health.limit = 10_000;
    config.security.abuse.burst_limit = 100_000;
    config
}

pub async fn spawn_app() -> Router {
    spawn_app_with(test_config()).await
}

pub async fn spawn_app_with(config: Config) -> Router {
    let (router, _) = spawn_app_with_storage(config, Arc::new(MockStorage::default())).await;
    router
}

pub async fn spawn_app_with_storage(
    config: Config,
    storage: Arc<MockStorage>,
) -> (Router, Arc<MockStorage>) {
    let shared = SharedState::with_storage(config, storage.clone())
        .await
        .expect("Failed to build shared state");
    let state = fispq::api::create_app_state(Arc::new(shared), None);
    (fispq::api::router(state).await, storage)
}

/// Builds a request with the ambient test identity (agent + address).
pub fn request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("user-agent", TEST_AGENT)
        .header("x-forwarded-for", TEST_IP);

    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }

    match body {
        Some(json) => {
            let payload = serde_json::to_string(&json).unwrap();
            builder
                .header("content-type", "application/json")
                .header("content-length", payload.len().to_string())
                .body(Body::from(payload))
                .unwrap()
        }
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

pub async fn login(app: &Router, username: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        request(
            "POST",
            "/api/auth/login",
            None,
            Some(serde_json::json!({ "username": username, "password": password })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body["data"]["access_token"].as_str().unwrap().to_string()
}

pub async fn register(app: &Router, username: &str, email: &str, role: &str) -> i32 {
    let (status, body) = send(
        app,
        request(
            "POST",
            "/api/auth/register",
            None,
            Some(serde_json::json!({
                "username": username,
                "email": email,
                "password": "senha-forte-123",
                "role": role,
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    i32::try_from(body["data"]["id"].as_i64().unwrap()).unwrap()
}

/// Registers and logs in, returning the bearer token.
pub async fn register_and_login(app: &Router, username: &str, email: &str, role: &str) -> String {
    register(app, username, email, role).await;
    login(app, username, "senha-forte-123").await
}

/// Hand-rolled multipart body for upload tests.
pub fn multipart_upload(
    filename: &str,
    data: &[u8],
    product_id: Option<i32>,
) -> (String, Vec<u8>) {
    let boundary = "fispq-test-boundary";
    let mut body = Vec::new();

    if let Some(id) = product_id {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\ncontent-disposition: form-data; name=\"product_id\"\r\n\r\n{id}\r\n"
            )
            .as_bytes(),
        );
    }

    body.extend_from_slice(
        format!(
            "--{boundary}\r\ncontent-disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\ncontent-type: application/pdf\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    (format!("multipart/form-data; boundary={boundary}"), body)
}

pub fn upload_request(
    token: &str,
    filename: &str,
    data: &[u8],
    product_id: Option<i32>,
) -> Request<Body> {
    let (content_type, body) = multipart_upload(filename, data, product_id);
    Request::builder()
        .method("POST")
        .uri("/api/documents/upload")
        .header("user-agent", TEST_AGENT)
        .header("x-forwarded-for", TEST_IP)
        .header("authorization", format!("Bearer {token}"))
        .header("content-type", content_type)
        .header("content-length", body.len().to_string())
        .body(Body::from(body))
        .unwrap()
}
