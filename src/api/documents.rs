use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::{HeaderMap, header},
};
use std::sync::Arc;

use super::auth::{CurrentUser, require};
use super::types::{
    DocumentEntry, MessageResponse, ProductDocumentDto, ProductDto, ReducedDocumentDto,
    UploadResponse,
};
use super::validation::parse_id;
use super::{ApiError, ApiResponse, AppState};
use crate::db::NewDocument;
use crate::models::Role;
use crate::security::policy::{self, Operation};

/// POST /api/documents/upload
/// Streams a PDF to object storage under a collision-resistant key and
/// appends an audit record. The original filename survives only as
/// metadata. An optional `product_id` field attaches the document to a
/// product in the same request.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<CurrentUser>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<UploadResponse>>, ApiError> {
    require(subject.role, Operation::UploadDocument)?;

    let max_bytes = state.shared.config.read().await.storage.max_upload_bytes;

    // The size bound is enforced from the declared length, before any of
    // the payload is pulled from the socket.
    if let Some(declared) = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.parse::<usize>().ok())
        && declared > max_bytes
    {
        return Err(ApiError::validation(format!(
            "File exceeds the maximum allowed size of {max_bytes} bytes"
        )));
    }

    let mut file: Option<(String, Vec<u8>)> = None;
    let mut product_id: Option<i32> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("Malformed multipart payload: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| ApiError::validation("No file selected"))?;

                let mut data = Vec::new();
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| ApiError::validation(format!("Failed to read upload: {e}")))?
                {
                    if data.len() + chunk.len() > max_bytes {
                        return Err(ApiError::validation(format!(
                            "File exceeds the maximum allowed size of {max_bytes} bytes"
                        )));
                    }
                    data.extend_from_slice(&chunk);
                }

                file = Some((filename, data));
            }
            Some("product_id") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| ApiError::validation(format!("Malformed product_id: {e}")))?;
                product_id = Some(parse_id("product", raw.trim())?);
            }
            _ => {}
        }
    }

    let (original_filename, data) = file.ok_or_else(|| ApiError::validation("No file sent"))?;

    if data.is_empty() {
        return Err(ApiError::validation("Uploaded file is empty"));
    }

    let guessed = mime_guess::from_path(&original_filename).first_or_octet_stream();
    if guessed != mime_guess::mime::APPLICATION_PDF {
        return Err(ApiError::validation("Only PDF documents are accepted"));
    }

    // Attachment target is validated before paying for the transfer
    if let Some(id) = product_id
        && state.shared.store.get_product(id).await?.is_none()
    {
        return Err(ApiError::not_found("Product", id));
    }

    let storage_key = format!("uploads/{}.pdf", uuid::Uuid::new_v4());

    let url = state
        .shared
        .storage
        .put(&storage_key, data.into(), "application/pdf")
        .await
        .map_err(|e| ApiError::storage_error(e.to_string()))?;

    let record = state
        .shared
        .store
        .record_upload(NewDocument {
            original_filename,
            storage_key: storage_key.clone(),
            url: url.clone(),
            uploaded_by: subject.id,
        })
        .await?;

    if let Some(id) = product_id {
        state
            .shared
            .store
            .attach_product_document(id, &url, &storage_key)
            .await?
            .ok_or_else(|| ApiError::not_found("Product", id))?;
    }

    tracing::info!(
        upload_id = record.id,
        user_id = subject.id,
        "Document uploaded"
    );

    Ok(Json(ApiResponse::success(UploadResponse::from(record))))
}

/// GET /api/documents
/// Lists document-bearing products under the caller's visibility filter.
/// Viewers get a reduced field projection; that shaping happens after the
/// authorization check, never instead of it.
pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<DocumentEntry>>>, ApiError> {
    require(subject.role, Operation::ListDocuments)?;

    let visibility = policy::visibility_for(subject.role, subject.id);
    let records = state
        .shared
        .store
        .list_products_with_document(&visibility)
        .await?;

    let mut entries = Vec::with_capacity(records.len());
    for record in records {
        let url_download = record.pdf_url.clone().unwrap_or_default();

        if subject.role == Role::Viewer {
            entries.push(DocumentEntry::Reduced(ReducedDocumentDto {
                id: record.id,
                nome_do_produto: record.nome_do_produto.clone(),
                qtade_maxima_armazenada: record.qtade_maxima_armazenada.clone(),
                url_download,
            }));
        } else {
            let creator = state
                .shared
                .store
                .get_user(record.created_by)
                .await?
                .map(|user| user.username);
            entries.push(DocumentEntry::Full(Box::new(ProductDocumentDto {
                product: ProductDto::from_record(record, creator),
                url_download,
            })));
        }
    }

    Ok(Json(ApiResponse::success(entries)))
}

/// DELETE /api/documents/{id}
/// Removes the stored object, clears any product pointers at it, then
/// drops the audit record.
pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<CurrentUser>,
    Path(raw_id): Path<String>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    require(subject.role, Operation::DeleteDocument)?;
    let id = parse_id("document", &raw_id)?;

    let record = state
        .shared
        .store
        .get_upload(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Document", id))?;

    state
        .shared
        .storage
        .delete(&record.storage_key)
        .await
        .map_err(|e| ApiError::storage_error(e.to_string()))?;

    // Products pointing at the deleted object lose both reference fields
    state
        .shared
        .store
        .clear_product_documents(&record.storage_key)
        .await?;

    state.shared.store.delete_upload(id).await?;

    tracing::info!(upload_id = id, user_id = subject.id, "Document deleted");

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Document deleted successfully".to_string(),
    })))
}
