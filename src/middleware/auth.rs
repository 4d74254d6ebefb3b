// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firebase ID token authentication middleware.

use crate::models::VerifiedPrincipal;
use crate::services::TokenError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// Cookie carrying the ID token for browser clients.
pub const TOKEN_COOKIE: &str = "membership_token";

/// Authenticated caller extracted from the ID token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub principal: VerifiedPrincipal,
    /// Raw ID token, needed for account updates on the caller's behalf.
    pub id_token: String,
}

impl AuthUser {
    pub fn subject(&self) -> &str {
        &self.principal.auth_subject_id
    }
}

/// Middleware that requires a valid Firebase ID token.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // Try cookie first, then header
    let token = match jar.get(TOKEN_COOKIE) {
        Some(cookie) => cookie.value().to_string(),
        None => bearer_token(request.headers()).ok_or(StatusCode::UNAUTHORIZED)?,
    };

    let principal = state.token_verifier.verify(&token).await.map_err(|e| match e {
        TokenError::Invalid(reason) => {
            tracing::debug!(reason = %reason, "Rejected ID token");
            StatusCode::UNAUTHORIZED
        }
        TokenError::Transient(reason) => {
            tracing::warn!(reason = %reason, "ID token keys unavailable");
            StatusCode::SERVICE_UNAVAILABLE
        }
    })?;

    request.extensions_mut().insert(AuthUser {
        principal,
        id_token: token,
    });

    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}
