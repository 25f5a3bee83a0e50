//! Admission interceptors that run ahead of routing and authentication.
//!
//! Ordered pipeline: abuse heuristics first, then the rate limiter; a
//! refusal from either terminates the request without revealing which
//! later check would have failed.

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;

use super::{ApiError, AppState};
use crate::security::abuse::{RequestSummary, Verdict};
use crate::security::rate_limit::Decision;

/// Resolves the client address, preferring proxy headers over the socket
/// peer the way the original deployment sat behind a reverse proxy.
fn client_ip(request: &Request) -> String {
    for name in ["x-forwarded-for", "x-real-ip"] {
        if let Some(value) = request.headers().get(name)
            && let Ok(raw) = value.to_str()
        {
            let first = raw.split(',').next().unwrap_or(raw).trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_string(), |info| info.0.ip().to_string())
}

/// Content types worth scanning for injection signatures. Binary bodies
/// (multipart uploads in particular) are skipped.
fn is_scannable(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|ct| {
            ct.starts_with("application/json")
                || ct.starts_with("application/x-www-form-urlencoded")
                || ct.starts_with("text/")
        })
}

pub async fn abuse_filter(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let sentinel = state.shared.sentinel.clone();
    let scan_cap = sentinel.settings().scan_cap_bytes;

    let ip = client_ip(&request);
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let path = request.uri().path().to_string();
    let query = request.uri().query().map(str::to_string);

    // Buffer the body only when it is textual and small enough to scan;
    // the request is rebuilt from the same bytes afterwards.
    let content_length = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.parse::<usize>().ok());

    let (request, body_bytes) = if is_scannable(&request)
        && content_length.is_some_and(|len| len > 0 && len <= scan_cap)
    {
        let (parts, body) = request.into_parts();
        let bytes = axum::body::to_bytes(body, scan_cap)
            .await
            .map_err(|e| ApiError::validation(format!("Failed to read request body: {e}")))?;
        let rebuilt = Request::from_parts(parts, Body::from(bytes.clone()));
        (rebuilt, Some(bytes))
    } else {
        (request, None)
    };

    let verdict = sentinel.inspect(&RequestSummary {
        client_ip: &ip,
        user_agent: user_agent.as_deref(),
        path: &path,
        query: query.as_deref(),
        body: body_bytes.as_deref(),
    });

    match verdict {
        Verdict::Clean => Ok(next.run(request).await),
        Verdict::Reject => Err(ApiError::RateLimited {
            retry_after_seconds: 0,
        }),
        Verdict::Blocked {
            retry_after_seconds,
        } => Err(ApiError::RateLimited {
            retry_after_seconds,
        }),
    }
}

pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ip = client_ip(&request);

    // Compose the key with the token subject when one is verifiable, so a
    // user cannot dodge their own quota by rotating addresses. Stateless
    // verification only: the identity store is never consulted here.
    let key = super::auth::bearer_token(request.headers())
        .and_then(|token| state.shared.tokens.verify(&token))
        .map_or_else(|| ip.clone(), |subject| format!("{ip}:{subject}"));

    let decision = state
        .shared
        .limiter
        .check(request.method(), request.uri().path(), &key);

    match decision {
        Decision::Admitted => Ok(next.run(request).await),
        Decision::Rejected {
            retry_after_seconds,
        } => {
            tracing::warn!(
                client = %key,
                path = request.uri().path(),
                "Rate limit exceeded"
            );
            Err(ApiError::RateLimited {
                retry_after_seconds,
            })
        }
    }
}
