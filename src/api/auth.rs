use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::types::{
    ChangePasswordRequest, LoginRequest, LoginResponse, MessageResponse, RegisterRequest, UserDto,
};
use super::validation::{require_field, validate_email, validate_password};
use super::{ApiError, ApiResponse, AppJson, AppState};
use crate::db::{NewUser, UserChanges};
use crate::models::Role;
use crate::security::policy::{self, Operation};

/// The authenticated subject, resolved once per request by the
/// authentication middleware and handed to handlers via extensions.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i32,
    pub username: String,
    pub role: Role,
}

/// Extracts the bearer credential, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

/// Role check against the static authorization table. Never a silent
/// allow: an absent entry denies.
pub fn require(role: Role, operation: Operation) -> Result<(), ApiError> {
    if policy::authorize(role, operation) {
        Ok(())
    } else {
        Err(ApiError::forbidden("Insufficient role for this operation"))
    }
}

/// Authentication middleware for every protected route. Verifies the
/// bearer token, then loads the account so role changes and deactivation
/// take effect immediately.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers()).ok_or_else(ApiError::unauthenticated)?;

    let subject_id = state
        .shared
        .tokens
        .verify(&token)
        .ok_or_else(ApiError::unauthenticated)?;

    let user = state
        .shared
        .store
        .get_user(subject_id)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .filter(|user| user.active)
        .ok_or_else(ApiError::unauthenticated)?;

    tracing::Span::current().record("user_id", user.id);

    request.extensions_mut().insert(CurrentUser {
        id: user.id,
        username: user.username,
        role: user.role,
    });

    Ok(next.run(request).await)
}

/// POST /api/auth/register
/// Self-registration. The role defaults to viewer when omitted.
pub async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserDto>>), ApiError> {
    let username = require_field(payload.username.as_deref(), "username")?.to_string();
    let email = require_field(payload.email.as_deref(), "email")?.to_string();
    let password = require_field(payload.password.as_deref(), "password")?.to_string();
    validate_email(&email)?;
    validate_password(&password)?;

    let role = match payload.role.as_deref() {
        Some(raw) => super::validation::parse_role(raw)?,
        None => Role::Viewer,
    };

    if state
        .shared
        .store
        .get_user_by_username(&username)
        .await?
        .is_some()
    {
        return Err(ApiError::conflict("Username already exists"));
    }
    if state.shared.store.get_user_by_email(&email).await?.is_some() {
        return Err(ApiError::conflict("Email already exists"));
    }

    let security = state.shared.config.read().await.security.clone();
    let user = state
        .shared
        .store
        .insert_user(
            NewUser {
                username,
                email,
                password,
                role,
            },
            &security,
        )
        .await?;

    tracing::info!(user_id = user.id, "Account registered");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(UserDto::from(user))),
    ))
}

/// POST /api/auth/login
/// Verifies credentials and returns a bearer token.
pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    let username = require_field(payload.username.as_deref(), "username")?;
    let password = require_field(payload.password.as_deref(), "password")?;

    let user = state
        .shared
        .store
        .verify_credentials(username, password)
        .await?
        .ok_or_else(|| ApiError::Unauthenticated("Invalid username or password".to_string()))?;

    let access_token = state.shared.tokens.issue(user.id)?;

    Ok(Json(ApiResponse::success(LoginResponse {
        access_token,
        token_type: "Bearer",
        user: UserDto::from(user),
    })))
}

/// GET /api/auth/me
pub async fn current_user(
    State(state): State<Arc<AppState>>,
    axum::Extension(subject): axum::Extension<CurrentUser>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let user = state
        .shared
        .store
        .get_user(subject.id)
        .await?
        .ok_or_else(ApiError::unauthenticated)?;

    Ok(Json(ApiResponse::success(UserDto::from(user))))
}

/// PUT /api/auth/password
/// Owners may rotate their own credential after proving the current one.
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    axum::Extension(subject): axum::Extension<CurrentUser>,
    AppJson(payload): AppJson<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    validate_password(&payload.new_password)?;
    if payload.current_password == payload.new_password {
        return Err(ApiError::validation(
            "New password must be different from current password",
        ));
    }

    let verified = state
        .shared
        .store
        .verify_credentials(&subject.username, &payload.current_password)
        .await?;
    if verified.is_none() {
        return Err(ApiError::validation("Current password is incorrect"));
    }

    let security = state.shared.config.read().await.security.clone();
    state
        .shared
        .store
        .update_user(
            subject.id,
            UserChanges {
                password: Some(payload.new_password),
                ..UserChanges::default()
            },
            &security,
        )
        .await?
        .ok_or_else(|| ApiError::not_found("User", subject.id))?;

    tracing::info!(user_id = subject.id, "Password changed");

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Password updated successfully".to_string(),
    })))
}
