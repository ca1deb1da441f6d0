//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs signed with `JWT_SECRET` and issued by the login
//! endpoint in exchange for `DASHBOARD_PASSWORD`. In dev mode (or when the
//! secrets are absent) every request is treated as the `dev` principal.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::routes::AppState;
use super::types::{LoginRequest, LoginResponse};
use crate::config::Config;

/// The authenticated principal, available to handlers as `Extension<AuthUser>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Sign a token for `username` valid for `ttl_days`.
pub fn issue_token(secret: &str, username: &str, ttl_days: i64) -> Result<(String, i64), ApiError> {
    let now = Utc::now().timestamp();
    let exp = now.saturating_add(ttl_days.max(1).saturating_mul(24 * 60 * 60));
    let claims = Claims {
        sub: username.to_string(),
        iat: now,
        exp,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("Failed to sign token: {}", e)))?;
    Ok((token, exp))
}

/// Verify a token and resolve its principal.
pub fn verify_token(token: &str, secret: &str) -> Option<AuthUser> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .ok()
        .map(|data| AuthUser {
            username: data.claims.sub,
        })
}

/// Verify `token` under the configured secret. No secret means no valid token.
pub fn verify_token_for_config(token: &str, config: &Config) -> Option<AuthUser> {
    config
        .auth
        .jwt_secret
        .as_deref()
        .and_then(|secret| verify_token(token, secret))
}

/// Credentials from `Authorization: Bearer <token>`; the scheme is case-insensitive.
fn bearer_token(request: &Request) -> Option<&str> {
    let value = request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|t| !t.is_empty())
}

/// Middleware resolving the principal before the handler runs.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let config = &state.config;

    let user = if !config.auth.auth_required(config.dev_mode) {
        AuthUser {
            username: "dev".to_string(),
        }
    } else {
        let Some(token) = bearer_token(&request) else {
            return ApiError::Unauthorized("Not authenticated".to_string()).into_response();
        };
        match verify_token_for_config(token, config) {
            Some(user) => user,
            None => {
                tracing::debug!("Rejected invalid or expired token");
                return ApiError::Unauthorized("Could not validate credentials".to_string())
                    .into_response();
            }
        }
    };

    request.extensions_mut().insert(user);
    next.run(request).await
}

/// POST /api/auth/login - Exchange the dashboard password for a JWT.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let auth = &state.config.auth;
    let (Some(expected), Some(secret)) = (&auth.dashboard_password, &auth.jwt_secret) else {
        return Err(ApiError::BadRequest(
            "Authentication is not configured".to_string(),
        ));
    };

    if !constant_time_eq(req.password.as_bytes(), expected.as_bytes()) {
        tracing::warn!("Failed login attempt");
        return Err(ApiError::Unauthorized("Invalid password".to_string()));
    }

    let username = req
        .username
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| "admin".to_string());
    let (token, exp) = issue_token(secret, &username, auth.jwt_ttl_days)?;
    tracing::info!(user = %username, "Issued access token");

    Ok(Json(LoginResponse { token, exp }))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
