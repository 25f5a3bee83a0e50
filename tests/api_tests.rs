mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;

#[tokio::test]
async fn health_reports_all_components_up() {
    let app = spawn_app().await;

    let (status, body) = send(&app, request("GET", "/api/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["database"], "up");
    assert_eq!(body["data"]["storage"], "up");
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn health_degrades_when_storage_is_down() {
    let storage = std::sync::Arc::new(MockStorage::default());
    storage.set_unhealthy();
    let (app, _) = spawn_app_with_storage(test_config(), storage).await;

    let (status, body) = send(&app, request("GET", "/api/health", None, None)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["data"]["database"], "up");
    assert_eq!(body["data"]["storage"], "down");
}

#[tokio::test]
async fn protected_routes_require_a_valid_bearer_token() {
    let app = spawn_app().await;

    let (status, _) = send(&app, request("GET", "/api/products", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        request("GET", "/api/products", Some("garbage-token"), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_login_and_me_flow() {
    let app = spawn_app().await;

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "username": "joana",
                "email": "joana@empresa.com.br",
                "password": "senha-forte-123",
                "role": "analista",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["username"], "joana");
    assert_eq!(body["data"]["role"], "analista");
    // The credential never appears in a response
    assert!(body["data"].get("password_hash").is_none());

    let token = login(&app, "joana", "senha-forte-123").await;

    let (status, body) = send(&app, request("GET", "/api/auth/me", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "joana");
    assert_eq!(body["data"]["email"], "joana@empresa.com.br");

    // Wrong password
    let (status, _) = send(
        &app,
        request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "username": "joana", "password": "errada-errada" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Missing fields
    let (status, _) = send(
        &app,
        request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "username": "joana" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn registration_without_role_defaults_to_viewer() {
    let app = spawn_app().await;

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "username": "curioso",
                "email": "curioso@empresa.com.br",
                "password": "senha-forte-123",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["role"], "visualizador");
}

#[tokio::test]
async fn registration_validates_fields() {
    let app = spawn_app().await;

    // Missing password
    let (status, _) = send(
        &app,
        request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "username": "x", "email": "x@empresa.com.br" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Invalid role value
    let (status, _) = send(
        &app,
        request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "username": "x",
                "email": "x@empresa.com.br",
                "password": "senha-forte-123",
                "role": "root",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Malformed email
    let (status, _) = send(
        &app,
        request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "username": "x",
                "email": "not-an-email",
                "password": "senha-forte-123",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_registration_conflicts_on_either_identity() {
    let app = spawn_app().await;
    register(&app, "original", "original@empresa.com.br", "visualizador").await;

    // Same email, new username
    let (status, _) = send(
        &app,
        request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "username": "outro",
                "email": "original@empresa.com.br",
                "password": "senha-forte-123",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Same username, new email
    let (status, _) = send(
        &app,
        request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "username": "original",
                "email": "novo@empresa.com.br",
                "password": "senha-forte-123",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn user_management_is_admin_only() {
    let app = spawn_app().await;
    let viewer = register_and_login(&app, "olhar", "olhar@empresa.com.br", "visualizador").await;
    let admin = login(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    let (status, _) = send(&app, request("GET", "/api/users", Some(&viewer), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, request("GET", "/api/users", Some(&admin), None)).await;
    assert_eq!(status, StatusCode::OK);
    let users = body["data"].as_array().unwrap();
    assert!(users.iter().any(|u| u["username"] == "admin"));
    assert!(users.iter().any(|u| u["username"] == "olhar"));
}

#[tokio::test]
async fn user_crud_edge_cases() {
    let app = spawn_app().await;
    let admin = login(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;
    let user_id = register(&app, "mutavel", "mutavel@empresa.com.br", "visualizador").await;

    // Invalid id is a validation error, not a missing record
    let (status, _) = send(&app, request("GET", "/api/users/abc", Some(&admin), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, request("GET", "/api/users/99999", Some(&admin), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Invalid role value on update
    let (status, _) = send(
        &app,
        request(
            "PUT",
            &format!("/api/users/{user_id}"),
            Some(&admin),
            Some(json!({ "role": "gerente" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Unknown payload key is rejected, not ignored
    let (status, _) = send(
        &app,
        request(
            "PUT",
            &format!("/api/users/{user_id}"),
            Some(&admin),
            Some(json!({ "role": "analista", "is_superuser": true })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Empty update
    let (status, _) = send(
        &app,
        request(
            "PUT",
            &format!("/api/users/{user_id}"),
            Some(&admin),
            Some(json!({})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Role escalation by admin works
    let (status, body) = send(
        &app,
        request(
            "PUT",
            &format!("/api/users/{user_id}"),
            Some(&admin),
            Some(json!({ "role": "analista" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "analista");

    // Delete, then the record is gone
    let (status, _) = send(
        &app,
        request("DELETE", &format!("/api/users/{user_id}"), Some(&admin), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        request("GET", &format!("/api/users/{user_id}"), Some(&admin), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleted_user_token_stops_working() {
    let app = spawn_app().await;
    let admin = login(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;
    let user_id = register(&app, "efemero", "efemero@empresa.com.br", "visualizador").await;
    let token = login(&app, "efemero", "senha-forte-123").await;

    let (status, _) = send(&app, request("GET", "/api/products", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);

    send(
        &app,
        request("DELETE", &format!("/api/users/{user_id}"), Some(&admin), None),
    )
    .await;

    // The token still verifies cryptographically, but the subject is gone
    let (status, _) = send(&app, request("GET", "/api/products", Some(&token), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn change_password_flow() {
    let app = spawn_app().await;
    let token = register_and_login(&app, "trocador", "trocador@empresa.com.br", "analista").await;

    // Wrong current password
    let (status, _) = send(
        &app,
        request(
            "PUT",
            "/api/auth/password",
            Some(&token),
            Some(json!({
                "current_password": "nao-e-essa",
                "new_password": "nova-senha-forte",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Correct rotation
    let (status, _) = send(
        &app,
        request(
            "PUT",
            "/api/auth/password",
            Some(&token),
            Some(json!({
                "current_password": "senha-forte-123",
                "new_password": "nova-senha-forte",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Old credential no longer authenticates; the new one does
    let (status, _) = send(
        &app,
        request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "username": "trocador", "password": "senha-forte-123" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    login(&app, "trocador", "nova-senha-forte").await;
}
