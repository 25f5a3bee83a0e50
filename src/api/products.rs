use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::auth::{CurrentUser, require};
use super::types::{MessageResponse, ProductDto};
use super::validation::{
    parse_id, parse_search_field, parse_status, require_field,
};
use super::{ApiError, ApiResponse, AppJson, AppState};
use crate::db::{NewProduct, ProductChanges, ProductRecord, SearchFilter, Store};
use crate::models::SearchField;
use crate::security::policy::{self, Operation, UpdateDenial};

use super::types::{CreateProductRequest, UpdateProductRequest};

/// Resolves creator usernames for a batch of records. Accounts deleted
/// since creation simply resolve to nothing.
async fn creator_names(
    store: &Store,
    records: &[ProductRecord],
) -> Result<HashMap<i32, String>, ApiError> {
    let mut ids: Vec<i32> = records.iter().map(|record| record.created_by).collect();
    ids.sort_unstable();
    ids.dedup();

    let users = store.get_users_by_ids(&ids).await?;
    Ok(users
        .into_iter()
        .map(|user| (user.id, user.username))
        .collect())
}

async fn to_dtos(
    store: &Store,
    records: Vec<ProductRecord>,
) -> Result<Vec<ProductDto>, ApiError> {
    let names = creator_names(store, &records).await?;
    Ok(records
        .into_iter()
        .map(|record| {
            let creator = names.get(&record.created_by).cloned();
            ProductDto::from_record(record, creator)
        })
        .collect())
}

fn stored_status(record: &ProductRecord) -> Result<crate::models::ProductStatus, ApiError> {
    crate::models::ProductStatus::parse(&record.status).ok_or_else(|| {
        ApiError::internal(format!(
            "Product {} carries unknown status '{}'",
            record.id, record.status
        ))
    })
}

async fn to_dto(store: &Store, record: ProductRecord) -> Result<ProductDto, ApiError> {
    let creator = store
        .get_user(record.created_by)
        .await?
        .map(|user| user.username);
    Ok(ProductDto::from_record(record, creator))
}

/// POST /api/products
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<CurrentUser>,
    AppJson(payload): AppJson<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ProductDto>>), ApiError> {
    require(subject.role, Operation::CreateProduct)?;

    let codigo = require_field(payload.codigo.as_deref(), "codigo")?.to_string();
    let nome = require_field(payload.nome_do_produto.as_deref(), "nome_do_produto")?.to_string();

    // Only an admin's requested status is even looked at; everyone else is
    // forced to pending by policy, without complaint.
    let requested = if subject.role == crate::models::Role::Admin {
        payload.status.as_deref().map(parse_status).transpose()?
    } else {
        None
    };
    let status = policy::initial_status(subject.role, requested);

    let record = state
        .shared
        .store
        .insert_product(NewProduct {
            codigo,
            nome_do_produto: nome,
            qtade_maxima_armazenada: payload.qtade_maxima_armazenada,
            fornecedor: payload.fornecedor,
            estado_fisico: payload.estado_fisico,
            local_de_armazenamento: payload.local_de_armazenamento,
            substancia1: payload.substancia1,
            n_cas1: payload.n_cas1,
            concentracao1: payload.concentracao1,
            substancia2: payload.substancia2,
            n_cas2: payload.n_cas2,
            concentracao2: payload.concentracao2,
            substancia3: payload.substancia3,
            n_cas3: payload.n_cas3,
            concentracao3: payload.concentracao3,
            perigos_fisicos: payload.perigos_fisicos,
            perigos_saude: payload.perigos_saude,
            perigos_meio_ambiente: payload.perigos_meio_ambiente,
            palavra_de_perigo: payload.palavra_de_perigo,
            categoria: payload.categoria,
            status: Some(status),
            created_by: subject.id,
        })
        .await?;

    tracing::info!(product_id = record.id, user_id = subject.id, "Product created");

    let dto = ProductDto::from_record(record, Some(subject.username));
    Ok((StatusCode::CREATED, Json(ApiResponse::success(dto))))
}

/// GET /api/products
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<ProductDto>>>, ApiError> {
    require(subject.role, Operation::ListProducts)?;

    let visibility = policy::visibility_for(subject.role, subject.id);
    let records = state.shared.store.list_products(&visibility).await?;
    let dtos = to_dtos(&state.shared.store, records).await?;

    Ok(Json(ApiResponse::success(dtos)))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub by: Option<String>,
}

/// GET /api/products/search
/// The role-scoped base filter always applies; the field predicate is
/// conjoined on top of it.
pub async fn search_products(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<CurrentUser>,
    Query(params): Query<SearchParams>,
) -> Result<Json<ApiResponse<Vec<ProductDto>>>, ApiError> {
    require(subject.role, Operation::SearchProducts)?;

    let visibility = policy::visibility_for(subject.role, subject.id);
    let field = parse_search_field(params.by.as_deref().unwrap_or("nome_do_produto"))?;

    let needle = params.q.as_deref().map(str::trim).unwrap_or_default();
    let records = if needle.is_empty() {
        state.shared.store.list_products(&visibility).await?
    } else {
        let filter = if field == SearchField::Id {
            SearchFilter::Id(parse_id("product", needle)?)
        } else {
            SearchFilter::Text(field, needle.to_string())
        };
        state.shared.store.search_products(&visibility, filter).await?
    };

    let dtos = to_dtos(&state.shared.store, records).await?;
    Ok(Json(ApiResponse::success(dtos)))
}

/// GET /api/products/{id}
/// Re-applies the visibility predicate against the specific record. A
/// record that exists but is not visible yields an explicit refusal, so
/// authorization failures and missing records stay distinguishable.
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<CurrentUser>,
    Path(raw_id): Path<String>,
) -> Result<Json<ApiResponse<ProductDto>>, ApiError> {
    require(subject.role, Operation::GetProduct)?;
    let id = parse_id("product", &raw_id)?;

    let record = state
        .shared
        .store
        .get_product(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product", id))?;

    let status = stored_status(&record)?;
    if !policy::can_view(subject.role, subject.id, status, record.created_by) {
        return Err(ApiError::forbidden(
            "This product is not available for your role",
        ));
    }

    let dto = to_dto(&state.shared.store, record).await?;
    Ok(Json(ApiResponse::success(dto)))
}

/// PUT /api/products/{id}
pub async fn update_product(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<CurrentUser>,
    Path(raw_id): Path<String>,
    AppJson(payload): AppJson<UpdateProductRequest>,
) -> Result<Json<ApiResponse<ProductDto>>, ApiError> {
    require(subject.role, Operation::UpdateProduct)?;
    let id = parse_id("product", &raw_id)?;

    let record = state
        .shared
        .store
        .get_product(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product", id))?;

    let current_status = stored_status(&record)?;
    let touches_status = payload.status.is_some();

    // All-or-nothing: any denial aborts before a single field is written.
    policy::can_update(
        subject.role,
        subject.id,
        current_status,
        record.created_by,
        touches_status,
    )
    .map_err(|denial| match denial {
        UpdateDenial::NotOwner => {
            ApiError::forbidden("You can only edit products you created")
        }
        UpdateDenial::ApprovedLocked => {
            ApiError::forbidden("Approved products can no longer be edited by analysts")
        }
        UpdateDenial::StatusField => {
            ApiError::forbidden("Analysts cannot change the product status")
        }
        UpdateDenial::Role => ApiError::forbidden("Insufficient role for this operation"),
    })?;

    // Status values are validated against the fixed set, never coerced
    let status = payload.status.as_deref().map(parse_status).transpose()?;

    let changes = ProductChanges {
        codigo: payload.codigo,
        nome_do_produto: payload.nome_do_produto,
        qtade_maxima_armazenada: payload.qtade_maxima_armazenada,
        fornecedor: payload.fornecedor,
        estado_fisico: payload.estado_fisico,
        local_de_armazenamento: payload.local_de_armazenamento,
        substancia1: payload.substancia1,
        n_cas1: payload.n_cas1,
        concentracao1: payload.concentracao1,
        substancia2: payload.substancia2,
        n_cas2: payload.n_cas2,
        concentracao2: payload.concentracao2,
        substancia3: payload.substancia3,
        n_cas3: payload.n_cas3,
        concentracao3: payload.concentracao3,
        perigos_fisicos: payload.perigos_fisicos,
        perigos_saude: payload.perigos_saude,
        perigos_meio_ambiente: payload.perigos_meio_ambiente,
        palavra_de_perigo: payload.palavra_de_perigo,
        categoria: payload.categoria,
        status,
    };

    if changes.is_empty() {
        return Err(ApiError::validation("No fields to update"));
    }

    let updated = state
        .shared
        .store
        .update_product(id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Product", id))?;

    tracing::info!(product_id = id, user_id = subject.id, "Product updated");

    let dto = to_dto(&state.shared.store, updated).await?;
    Ok(Json(ApiResponse::success(dto)))
}

/// DELETE /api/products/{id}
pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<CurrentUser>,
    Path(raw_id): Path<String>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    require(subject.role, Operation::DeleteProduct)?;
    let id = parse_id("product", &raw_id)?;

    if !state.shared.store.delete_product(id).await? {
        return Err(ApiError::not_found("Product", id));
    }

    tracing::info!(product_id = id, user_id = subject.id, "Product deleted");

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Product deleted successfully".to_string(),
    })))
}
