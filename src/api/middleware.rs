//! API Middleware
//!
//! Bearer-session authentication and request logging.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::sha256_hex;
use crate::domain::OperationContext;
use crate::error::AppError;
use crate::repository::sessions;
use crate::state::AppState;

/// SHA-256 of the bearer token that authenticated the request
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Context with the caller's correlation ID, or a fresh one
pub fn request_context(headers: &HeaderMap) -> OperationContext {
    let correlation_id = headers
        .get("X-Correlation-Id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    OperationContext::new().with_correlation_id(correlation_id)
}

// =========================================================================
// Authentication
// =========================================================================

/// Resolve the bearer session to a principal, or answer 401
pub async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = bearer_token(&headers).ok_or_else(|| {
        AppError::Unauthorized("missing bearer token".to_string()).into_response()
    })?;
    let token_hash = sha256_hex(token);

    let mut conn = state.pool.acquire().await.map_err(|e| AppError::from(e).into_response())?;
    let principal = sessions::resolve(&mut conn, &token_hash, Utc::now())
        .await
        .map_err(|e| AppError::from(e).into_response())?
        .ok_or_else(|| AppError::Unauthorized("invalid or expired session".to_string()).into_response())?;
    drop(conn);

    let context = request_context(&headers).with_principal(principal);

    request.extensions_mut().insert(principal);
    request.extensions_mut().insert(SessionToken(token_hash));
    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

// =========================================================================
// Request logging
// =========================================================================

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie"];

/// Mask sensitive headers for logging
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let masked_value = if SENSITIVE_HEADERS.contains(&name.as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[invalid utf8]").to_string()
            };
            (name.to_string(), masked_value)
        })
        .collect()
}

/// Request logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let headers = mask_headers_for_logging(request.headers());
    let correlation_id = request
        .headers()
        .get("X-Correlation-Id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        correlation_id = ?correlation_id,
        request_id = ?request_id,
        headers = ?headers,
        "Incoming request"
    );

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = %start.elapsed().as_millis(),
        correlation_id = ?correlation_id,
        request_id = ?request_id,
        "Request completed"
    );

    response
}
