use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;
use crate::security::redact::redact;

#[derive(Debug)]
pub enum ApiError {
    /// Malformed input: missing fields, bad identifiers, invalid enum
    /// values, unknown payload keys.
    Validation(String),

    /// Missing or unverifiable credential. Distinct from Forbidden.
    Unauthenticated(String),

    /// Authenticated, but policy denies the operation.
    Forbidden(String),

    NotFound(String),

    /// Uniqueness violation.
    Conflict(String),

    /// Refused by the rate limiter or the abuse filter.
    RateLimited { retry_after_seconds: u64 },

    /// An external collaborator (storage, database) is unavailable. The
    /// detail is logged after redaction and never returned to the client.
    Dependency { service: String, detail: String },

    Database(String),

    Internal(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Validation(msg) => write!(f, "Validation error: {}", msg),
            ApiError::Unauthenticated(msg) => write!(f, "Unauthenticated: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::RateLimited { .. } => write!(f, "Too many requests"),
            ApiError::Dependency { service, .. } => write!(f, "{} is unavailable", service),
            ApiError::Database(msg) => write!(f, "Database error: {}", msg),
            ApiError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::RateLimited {
                retry_after_seconds,
            } => {
                let body = serde_json::json!({
                    "success": false,
                    "error": "Too many requests. Try again later.",
                    "retry_after": retry_after_seconds,
                });
                let mut response =
                    (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                // A zero hint means "rejected, but not on a timer"
                if *retry_after_seconds > 0
                    && let Ok(value) = HeaderValue::from_str(&retry_after_seconds.to_string())
                {
                    response.headers_mut().insert(header::RETRY_AFTER, value);
                }
                return response;
            }
            ApiError::Dependency { service, detail } => {
                tracing::error!("{} unavailable: {}", service, redact(detail));
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("{} is unavailable", service),
                )
            }
            ApiError::Database(msg) => {
                tracing::error!("Database error: {}", redact(msg));
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", redact(msg));
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ApiResponse::<()>::error(error_message);
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(err: sea_orm::DbErr) -> Self {
        ApiError::Database(err.to_string())
    }
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    pub fn unauthenticated() -> Self {
        ApiError::Unauthenticated("Missing or invalid credentials".to_string())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ApiError::Forbidden(msg.into())
    }

    pub fn not_found(resource: &str, id: impl fmt::Display) -> Self {
        ApiError::NotFound(format!("{} {} not found", resource, id))
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ApiError::Conflict(msg.into())
    }

    pub fn storage_error(detail: impl Into<String>) -> Self {
        ApiError::Dependency {
            service: "Object storage".to_string(),
            detail: detail.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError::Internal(msg.into())
    }
}
