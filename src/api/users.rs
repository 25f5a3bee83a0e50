use axum::{
    Extension, Json,
    extract::{Path, State},
};
use std::sync::Arc;

use super::auth::{CurrentUser, require};
use super::types::{MessageResponse, UpdateUserRequest, UserDto};
use super::validation::{parse_id, parse_role, validate_email, validate_password};
use super::{ApiError, ApiResponse, AppJson, AppState};
use crate::db::UserChanges;
use crate::security::policy::Operation;

/// GET /api/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<UserDto>>>, ApiError> {
    require(subject.role, Operation::ListUsers)?;

    let users = state.shared.store.list_users().await?;
    Ok(Json(ApiResponse::success(
        users.into_iter().map(UserDto::from).collect(),
    )))
}

/// GET /api/users/{id}
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<CurrentUser>,
    Path(raw_id): Path<String>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    require(subject.role, Operation::GetUser)?;
    let id = parse_id("user", &raw_id)?;

    let user = state
        .shared
        .store
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User", id))?;

    Ok(Json(ApiResponse::success(UserDto::from(user))))
}

/// PUT /api/users/{id}
/// Updates flow through an explicit allow-list: username, email, role,
/// password. Unknown keys are rejected at deserialization.
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<CurrentUser>,
    Path(raw_id): Path<String>,
    AppJson(payload): AppJson<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    require(subject.role, Operation::UpdateUser)?;
    let id = parse_id("user", &raw_id)?;

    state
        .shared
        .store
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User", id))?;

    let role = payload.role.as_deref().map(parse_role).transpose()?;
    if let Some(email) = payload.email.as_deref() {
        validate_email(email)?;
    }
    if let Some(password) = payload.password.as_deref() {
        validate_password(password)?;
    }

    let changes = UserChanges {
        username: payload.username,
        email: payload.email,
        role,
        password: payload.password,
    };
    if changes.is_empty() {
        return Err(ApiError::validation("No fields to update"));
    }

    if let Some(username) = changes.username.as_deref()
        && state
            .shared
            .store
            .get_user_by_username(username)
            .await?
            .is_some_and(|other| other.id != id)
    {
        return Err(ApiError::conflict("Username already exists"));
    }
    if let Some(email) = changes.email.as_deref()
        && state
            .shared
            .store
            .get_user_by_email(email)
            .await?
            .is_some_and(|other| other.id != id)
    {
        return Err(ApiError::conflict("Email already exists"));
    }

    let security = state.shared.config.read().await.security.clone();
    let user = state
        .shared
        .store
        .update_user(id, changes, &security)
        .await?
        .ok_or_else(|| ApiError::not_found("User", id))?;

    tracing::info!(user_id = id, admin = subject.id, "Account updated");

    Ok(Json(ApiResponse::success(UserDto::from(user))))
}

/// DELETE /api/users/{id}
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<CurrentUser>,
    Path(raw_id): Path<String>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    require(subject.role, Operation::DeleteUser)?;
    let id = parse_id("user", &raw_id)?;

    if !state.shared.store.delete_user(id).await? {
        return Err(ApiError::not_found("User", id));
    }

    tracing::info!(user_id = id, admin = subject.id, "Account deleted");

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "User deleted successfully".to_string(),
    })))
}
