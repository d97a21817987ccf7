//! API Middleware
//!
//! API key authentication, permission checks and request logging.

use std::net::{IpAddr, SocketAddr};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::OperationContext;
use crate::error::AppError;
use crate::handlers::REQUEST_USER_HEADER;

pub const API_KEY_HEADER: &str = "X-API-Key";
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Permission names stored in `api_keys.permissions`
pub mod permissions {
    pub const READ_LOANS: &str = "read:loans";
    pub const WRITE_LOANS: &str = "write:loans";
    pub const WRITE_USERS: &str = "write:users";
    pub const ADMIN: &str = "admin";
}

/// API Key authentication result
#[derive(Debug, Clone)]
pub struct AuthenticatedApiKey {
    pub id: Uuid,
    pub name: String,
    pub permissions: Vec<String>,
}

impl AuthenticatedApiKey {
    /// Check if this API key has a specific permission
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions
            .iter()
            .any(|p| p == permission || p == permissions::ADMIN)
    }

    pub fn require(&self, permission: &str) -> Result<(), AppError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!("API key lacks permission {}", permission)))
        }
    }
}

/// Hex SHA-256 digest under which an API key is stored
pub fn hash_api_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

// =========================================================================
// API Key Authentication Middleware
// =========================================================================

/// Validate `X-API-Key` and attach the key and an [`OperationContext`]
/// to the request
pub async fn auth_middleware(
    State(pool): State<PgPool>,
    headers: HeaderMap,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let api_key = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::InvalidApiKey)?;

    let record: Option<(Uuid, String, Vec<String>, bool)> = sqlx::query_as(
        r#"
        SELECT id, name, permissions, is_active
        FROM api_keys
        WHERE key_hash = $1
        "#,
    )
    .bind(hash_api_key(api_key))
    .fetch_optional(&pool)
    .await?;

    let (api_key_id, name, permissions, is_active) = record.ok_or(AppError::InvalidApiKey)?;

    if !is_active {
        tracing::warn!(api_key = %name, "Rejected disabled API key");
        return Err(AppError::InvalidApiKey);
    }

    let mut context = OperationContext::new().with_api_key(api_key_id);

    if let Some(raw) = headers.get(REQUEST_USER_HEADER) {
        let user_id = raw
            .to_str()
            .ok()
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .ok_or_else(|| {
                AppError::InvalidRequest(format!("Invalid {} header format", REQUEST_USER_HEADER))
            })?;
        context = context.with_request_user(user_id);
    }

    if let Some(correlation_id) = correlation_id(&headers) {
        context = context.with_correlation_id(correlation_id);
    }
    context.ensure_correlation_id();

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    if let Some(ip) = forwarded_for(&headers).or(peer) {
        context = context.with_client_ip(ip);
    }

    tracing::debug!(
        api_key = %name,
        client_ip = ?context.client_ip,
        request_user_id = ?context.request_user_id,
        "Request authenticated"
    );

    request.extensions_mut().insert(AuthenticatedApiKey {
        id: api_key_id,
        name,
        permissions,
    });
    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

/// First address of `X-Forwarded-For`, the client as seen by the proxy
fn forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse().ok())
}

fn correlation_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
}

// =========================================================================
// Request logging
// =========================================================================

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &["x-api-key", "authorization", "cookie", "set-cookie"];

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

/// Log every request and its outcome. Runs before authentication, so it
/// assigns the correlation id when the caller did not send one and
/// echoes it on the response.
pub async fn logging_middleware(mut request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let correlation_id = correlation_id(request.headers()).unwrap_or_else(Uuid::new_v4);
    let header_value = HeaderValue::from_str(&correlation_id.to_string()).ok();
    if let Some(value) = header_value.clone() {
        request.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }

    let headers = mask_headers_for_logging(request.headers());
    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        correlation_id = %correlation_id,
        headers = ?headers,
        "Incoming request"
    );

    let mut response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = %start.elapsed().as_millis(),
        correlation_id = %correlation_id,
        "Request completed"
    );

    if let Some(value) = header_value {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }

    response
}
