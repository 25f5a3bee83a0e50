use axum::{
    Json,
    extract::{FromRequest, Request},
};
use serde::{Deserialize, Serialize};

use super::ApiError;
use crate::db::{DocumentRecord, ProductRecord, User};
use crate::models::Role;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// JSON extractor that reports deserialization problems as 400s in the
/// standard response envelope instead of axum's default 422.
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    T: serde::de::DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::validation(rejection.body_text())),
        }
    }
}

// ============================================================================
// Accounts
// ============================================================================

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
    pub created_at: String,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            active: user.active,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub user: UserDto,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// ============================================================================
// Products
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateProductRequest {
    pub codigo: Option<String>,
    pub nome_do_produto: Option<String>,
    pub qtade_maxima_armazenada: Option<String>,
    pub fornecedor: Option<String>,
    pub estado_fisico: Option<String>,
    pub local_de_armazenamento: Option<String>,
    pub substancia1: Option<String>,
    #[serde(rename = "nCas1")]
    pub n_cas1: Option<String>,
    pub concentracao1: Option<String>,
    pub substancia2: Option<String>,
    #[serde(rename = "nCas2")]
    pub n_cas2: Option<String>,
    pub concentracao2: Option<String>,
    pub substancia3: Option<String>,
    #[serde(rename = "nCas3")]
    pub n_cas3: Option<String>,
    pub concentracao3: Option<String>,
    pub perigos_fisicos: Option<String>,
    pub perigos_saude: Option<String>,
    pub perigos_meio_ambiente: Option<String>,
    pub palavra_de_perigo: Option<String>,
    pub categoria: Option<String>,
    pub status: Option<String>,
}

/// Explicit allow-list of mutable fields. Unknown keys are rejected at
/// deserialization, never silently dropped.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProductRequest {
    pub codigo: Option<String>,
    pub nome_do_produto: Option<String>,
    pub qtade_maxima_armazenada: Option<String>,
    pub fornecedor: Option<String>,
    pub estado_fisico: Option<String>,
    pub local_de_armazenamento: Option<String>,
    pub substancia1: Option<String>,
    #[serde(rename = "nCas1")]
    pub n_cas1: Option<String>,
    pub concentracao1: Option<String>,
    pub substancia2: Option<String>,
    #[serde(rename = "nCas2")]
    pub n_cas2: Option<String>,
    pub concentracao2: Option<String>,
    pub substancia3: Option<String>,
    #[serde(rename = "nCas3")]
    pub n_cas3: Option<String>,
    pub concentracao3: Option<String>,
    pub perigos_fisicos: Option<String>,
    pub perigos_saude: Option<String>,
    pub perigos_meio_ambiente: Option<String>,
    pub palavra_de_perigo: Option<String>,
    pub categoria: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProductDto {
    pub id: i32,
    pub codigo: String,
    pub nome_do_produto: String,
    pub qtade_maxima_armazenada: Option<String>,
    pub fornecedor: Option<String>,
    pub estado_fisico: Option<String>,
    pub local_de_armazenamento: Option<String>,
    pub substancia1: Option<String>,
    #[serde(rename = "nCas1")]
    pub n_cas1: Option<String>,
    pub concentracao1: Option<String>,
    pub substancia2: Option<String>,
    #[serde(rename = "nCas2")]
    pub n_cas2: Option<String>,
    pub concentracao2: Option<String>,
    pub substancia3: Option<String>,
    #[serde(rename = "nCas3")]
    pub n_cas3: Option<String>,
    pub concentracao3: Option<String>,
    pub perigos_fisicos: Option<String>,
    pub perigos_saude: Option<String>,
    pub perigos_meio_ambiente: Option<String>,
    pub palavra_de_perigo: Option<String>,
    pub categoria: Option<String>,
    pub status: String,
    pub created_by_user_id: i32,
    /// Creator's username, null when that account no longer exists.
    pub created_by: Option<String>,
    pub pdf_url: Option<String>,
    pub pdf_storage_key: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ProductDto {
    #[must_use]
    pub fn from_record(record: ProductRecord, created_by: Option<String>) -> Self {
        Self {
            id: record.id,
            codigo: record.codigo,
            nome_do_produto: record.nome_do_produto,
            qtade_maxima_armazenada: record.qtade_maxima_armazenada,
            fornecedor: record.fornecedor,
            estado_fisico: record.estado_fisico,
            local_de_armazenamento: record.local_de_armazenamento,
            substancia1: record.substancia1,
            n_cas1: record.n_cas1,
            concentracao1: record.concentracao1,
            substancia2: record.substancia2,
            n_cas2: record.n_cas2,
            concentracao2: record.concentracao2,
            substancia3: record.substancia3,
            n_cas3: record.n_cas3,
            concentracao3: record.concentracao3,
            perigos_fisicos: record.perigos_fisicos,
            perigos_saude: record.perigos_saude,
            perigos_meio_ambiente: record.perigos_meio_ambiente,
            palavra_de_perigo: record.palavra_de_perigo,
            categoria: record.categoria,
            status: record.status,
            created_by_user_id: record.created_by,
            created_by,
            pdf_url: record.pdf_url,
            pdf_storage_key: record.pdf_storage_key,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

// ============================================================================
// Documents
// ============================================================================

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub id: i32,
    pub url: String,
    pub storage_key: String,
    pub original_filename: String,
}

impl From<DocumentRecord> for UploadResponse {
    fn from(record: DocumentRecord) -> Self {
        Self {
            id: record.id,
            url: record.url,
            storage_key: record.storage_key,
            original_filename: record.original_filename,
        }
    }
}

/// One entry of the document listing. Viewers receive the reduced shape;
/// the projection is response shaping applied after authorization, not an
/// authorization rule of its own.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum DocumentEntry {
    Full(Box<ProductDocumentDto>),
    Reduced(ReducedDocumentDto),
}

#[derive(Debug, Serialize)]
pub struct ProductDocumentDto {
    #[serde(flatten)]
    pub product: ProductDto,
    pub url_download: String,
}

#[derive(Debug, Serialize)]
pub struct ReducedDocumentDto {
    pub id: i32,
    pub nome_do_produto: String,
    pub qtade_maxima_armazenada: Option<String>,
    pub url_download: String,
}

// ============================================================================
// System
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub database: &'static str,
    pub storage: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
}
