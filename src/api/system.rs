use axum::{Json, extract::State, http::StatusCode};
use std::sync::Arc;

use super::types::HealthStatus;
use super::{ApiResponse, AppState};
use crate::security::redact::redact;

/// GET /api/health
/// Probes the database and object storage; degraded dependencies turn the
/// whole answer into a 503.
pub async fn health(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ApiResponse<HealthStatus>>) {
    let database_up = match state.shared.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("Database health check failed: {}", redact(&e.to_string()));
            false
        }
    };

    let storage_up = state.shared.storage.head_bucket().await;
    if !storage_up {
        tracing::warn!("Object storage health check failed");
    }

    let healthy = database_up && storage_up;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = HealthStatus {
        status: if healthy { "ok" } else { "degraded" },
        database: if database_up { "up" } else { "down" },
        storage: if storage_up { "up" } else { "down" },
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    };

    (status, Json(ApiResponse::success(body)))
}
