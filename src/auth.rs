//! X-API-Key authentication for the protected route group.
//!
//! Keys come from `TASKCHAT_API_KEYS` (comma-separated). Without it, a
//! production deployment (`TASKCHAT_ENV=production`) refuses to serve,
//! while a dev run falls back to `TASKCHAT_DEV_API_KEY` or a well-known
//! local key.

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::env;

use crate::errors::ErrorResponse;

#[derive(Debug)]
pub enum AuthError {
    MissingApiKey,
    InvalidApiKey,
    NotConfigured,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AuthError::MissingApiKey => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Missing X-API-Key header",
            ),
            AuthError::InvalidApiKey => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "Invalid API key")
            }
            AuthError::NotConfigured => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                "API keys not configured. Set TASKCHAT_API_KEYS environment variable.",
            ),
        };

        let body = ErrorResponse {
            code: code.to_string(),
            message: message.to_string(),
            details: None,
            request_id: None,
        };
        (status, Json(body)).into_response()
    }
}

/// Constant-time equality. Key length is not treated as secret.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |diff, (x, y)| diff | (x ^ y))
        == 0
}

/// Checks `provided` against a comma-separated key list. Every candidate
/// is compared; a hit never short-circuits the scan.
fn any_key_matches(configured: &str, provided: &str) -> bool {
    configured
        .split(',')
        .map(str::trim)
        .fold(false, |hit, key| hit | constant_time_compare(key, provided))
}

/// Resolves the active key list from the environment.
fn configured_keys() -> Result<String, AuthError> {
    if let Ok(keys) = env::var("TASKCHAT_API_KEYS") {
        if !keys.trim().is_empty() {
            return Ok(keys);
        }
    }

    let is_production = env::var("TASKCHAT_ENV")
        .map(|v| {
            let v = v.to_lowercase();
            v == "production" || v == "prod"
        })
        .unwrap_or(false);
    if is_production {
        tracing::error!("TASKCHAT_API_KEYS not set in production mode");
        return Err(AuthError::NotConfigured);
    }

    tracing::warn!("TASKCHAT_API_KEYS not set - using development key (not for production!)");
    Ok(env::var("TASKCHAT_DEV_API_KEY")
        .unwrap_or_else(|_| "taskchat-dev-key-change-in-production".to_string()))
}

pub fn validate_api_key(provided_key: &str) -> Result<(), AuthError> {
    let keys = configured_keys()?;
    if any_key_matches(&keys, provided_key) {
        Ok(())
    } else {
        Err(AuthError::InvalidApiKey)
    }
}

/// Layered onto the protected route group; public routes never pass
/// through here.
pub async fn auth_middleware(request: Request, next: Next) -> Response {
    let provided = request
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    match provided {
        None => AuthError::MissingApiKey.into_response(),
        Some(key) => match validate_api_key(&key) {
            Ok(()) => next.run(request).await,
            Err(e) => e.into_response(),
        },
    }
}
