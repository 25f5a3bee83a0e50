mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;
use std::sync::Arc;

const PDF_BYTES: &[u8] = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\ntrailer\n%%EOF";

async fn create_product(
    app: &axum::Router,
    token: &str,
    payload: serde_json::Value,
) -> i64 {
    let (status, body) = send(
        app,
        request("POST", "/api/products", Some(token), Some(payload)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn upload_is_admin_only() {
    let app = spawn_app().await;
    let ana = register_and_login(&app, "ana", "ana@empresa.com.br", "analista").await;

    let response = send(&app, upload_request(&ana, "fispq.pdf", PDF_BYTES, None)).await;
    assert_eq!(response.0, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn upload_stores_object_and_audit_record() {
    let storage = Arc::new(MockStorage::default());
    let (app, storage) = spawn_app_with_storage(test_config(), storage).await;
    let admin = login(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    let (status, body) = send(
        &app,
        upload_request(&admin, "FISPQ Ácido Sulfúrico.pdf", PDF_BYTES, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let key = body["data"]["storage_key"].as_str().unwrap();
    assert!(key.starts_with("uploads/"));
    assert!(key.ends_with(".pdf"));
    // The original filename is metadata, never the storage key
    assert!(!key.contains("Sulfúrico"));
    assert_eq!(
        body["data"]["original_filename"],
        "FISPQ Ácido Sulfúrico.pdf"
    );
    assert!(body["data"]["url"].as_str().unwrap().contains(key));

    assert!(storage.contains(key));
}

#[tokio::test]
async fn upload_attaches_to_a_product_when_asked() {
    let app = spawn_app().await;
    let admin = login(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;
    let product_id = create_product(
        &app,
        &admin,
        json!({ "codigo": "DOC-1", "nome_do_produto": "Com Ficha", "status": "aprovado" }),
    )
    .await;

    let (status, body) = send(
        &app,
        upload_request(
            &admin,
            "ficha.pdf",
            PDF_BYTES,
            Some(i32::try_from(product_id).unwrap()),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let url = body["data"]["url"].as_str().unwrap().to_string();
    let key = body["data"]["storage_key"].as_str().unwrap().to_string();

    // Both pointer fields land together
    let (_, body) = send(
        &app,
        request("GET", &format!("/api/products/{product_id}"), Some(&admin), None),
    )
    .await;
    assert_eq!(body["data"]["pdf_url"], url.as_str());
    assert_eq!(body["data"]["pdf_storage_key"], key.as_str());

    // Attaching to a missing product is refused before any transfer
    let (status, _) = send(
        &app,
        upload_request(&admin, "ficha.pdf", PDF_BYTES, Some(99999)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn upload_rejects_non_pdf_and_oversized_files() {
    let mut config = test_config();
    config.storage.max_upload_bytes = 1024;
    let app = spawn_app_with(config).await;
    let admin = login(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    let (status, _) = send(
        &app,
        upload_request(&admin, "planilha.xlsx", PDF_BYTES, None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // The declared size alone refuses the request before any transfer
    let big = vec![b'a'; 4096];
    let (status, _) = send(&app, upload_request(&admin, "grande.pdf", &big, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn document_listing_projects_by_role() {
    let app = spawn_app().await;
    let admin = login(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;
    let viewer = register_and_login(&app, "ver", "ver@empresa.com.br", "visualizador").await;

    let approved = create_product(
        &app,
        &admin,
        json!({
            "codigo": "DOC-A",
            "nome_do_produto": "Aprovado com Ficha",
            "qtade_maxima_armazenada": "50 L",
            "status": "aprovado",
        }),
    )
    .await;
    let pending = create_product(
        &app,
        &admin,
        json!({ "codigo": "DOC-P", "nome_do_produto": "Pendente com Ficha" }),
    )
    .await;
    let _without_pdf = create_product(
        &app,
        &admin,
        json!({ "codigo": "DOC-N", "nome_do_produto": "Sem Ficha", "status": "aprovado" }),
    )
    .await;

    for id in [approved, pending] {
        let (status, _) = send(
            &app,
            upload_request(
                &admin,
                "ficha.pdf",
                PDF_BYTES,
                Some(i32::try_from(id).unwrap()),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    // Admin sees both document-bearing products, full shape
    let (status, body) = send(&app, request("GET", "/api/documents", Some(&admin), None)).await;
    assert_eq!(status, StatusCode::OK);
    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e["url_download"].is_string()));
    assert!(entries.iter().any(|e| e["codigo"] == "DOC-A"));

    // Viewer sees only the approved one, and only the reduced fields
    let (status, body) = send(&app, request("GET", "/api/documents", Some(&viewer), None)).await;
    assert_eq!(status, StatusCode::OK);
    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    let entry = entries[0].as_object().unwrap();
    assert_eq!(entry["nome_do_produto"], "Aprovado com Ficha");
    assert_eq!(entry["qtade_maxima_armazenada"], "50 L");
    assert!(entry["url_download"].is_string());
    assert!(!entry.contains_key("codigo"));
    assert!(!entry.contains_key("created_by"));
    assert_eq!(entry.len(), 4);
}

#[tokio::test]
async fn deleting_a_document_clears_product_pointers() {
    let storage = Arc::new(MockStorage::default());
    let (app, storage) = spawn_app_with_storage(test_config(), storage).await;
    let admin = login(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;
    let ana = register_and_login(&app, "ana", "ana@empresa.com.br", "analista").await;

    let product_id = create_product(
        &app,
        &admin,
        json!({ "codigo": "DEL-1", "nome_do_produto": "Ficha Removível", "status": "aprovado" }),
    )
    .await;

    let (_, body) = send(
        &app,
        upload_request(
            &admin,
            "ficha.pdf",
            PDF_BYTES,
            Some(i32::try_from(product_id).unwrap()),
        ),
    )
    .await;
    let upload_id = body["data"]["id"].as_i64().unwrap();
    let key = body["data"]["storage_key"].as_str().unwrap().to_string();
    assert!(storage.contains(&key));

    // Not an admin operation for anyone else
    let (status, _) = send(
        &app,
        request(
            "DELETE",
            &format!("/api/documents/{upload_id}"),
            Some(&ana),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Malformed and missing ids
    let (status, _) = send(
        &app,
        request("DELETE", "/api/documents/abc", Some(&admin), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(
        &app,
        request("DELETE", "/api/documents/99999", Some(&admin), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The real deletion removes the object and both product pointers
    let (status, _) = send(
        &app,
        request(
            "DELETE",
            &format!("/api/documents/{upload_id}"),
            Some(&admin),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!storage.contains(&key));
    assert_eq!(storage.object_count(), 0);

    let (_, body) = send(
        &app,
        request("GET", &format!("/api/products/{product_id}"), Some(&admin), None),
    )
    .await;
    assert!(body["data"]["pdf_url"].is_null());
    assert!(body["data"]["pdf_storage_key"].is_null());

    // And the audit record is gone
    let (status, _) = send(
        &app,
        request(
            "DELETE",
            &format!("/api/documents/{upload_id}"),
            Some(&admin),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn upload_fails_cleanly_when_storage_is_down() {
    let storage = Arc::new(MockStorage::default());
    storage.set_unhealthy();
    let (app, _) = spawn_app_with_storage(test_config(), storage).await;
    let admin = login(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    let (status, body) = send(&app, upload_request(&admin, "ficha.pdf", PDF_BYTES, None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    // The dependency name is reported, its internals are not
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("storage"));
    assert!(!error.contains("connection refused"));
}
