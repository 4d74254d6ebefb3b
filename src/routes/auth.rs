// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sign-in routes: SMS code, email/password, password reset, logout.

use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Credential, PhoneVerification, VerifiedPrincipal};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;

/// Routes that establish a sign-in.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/phone/start", post(phone_start))
        .route("/auth/phone/confirm", post(phone_confirm))
        .route("/auth/email/signin", post(email_sign_in))
        .route("/auth/email/signup", post(email_sign_up))
        .route("/auth/password-reset", post(password_reset))
}

/// Routes that act on an existing sign-in.
pub fn session_routes() -> Router<Arc<AppState>> {
    Router::new().route("/auth/logout", post(logout))
}

// ─── Phone ───────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneStartRequest {
    phone_number: String,
    #[serde(default)]
    recaptcha_token: Option<String>,
}

/// Pending phone verification handed back to the client.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct PhoneStartResponse {
    pub verification_id: String,
    pub phone_number: String,
    pub expires_at: String,
}

/// Send an SMS verification code.
async fn phone_start(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PhoneStartRequest>,
) -> Result<Json<PhoneStartResponse>> {
    if req.phone_number.trim().is_empty() {
        return Err(AppError::BadRequest("phoneNumber is required".to_string()));
    }

    let verification = state
        .auth
        .send_phone_code(&req.phone_number, req.recaptcha_token.as_deref())
        .await?;

    Ok(Json(PhoneStartResponse {
        verification_id: verification.verification_id,
        phone_number: verification.phone_number,
        expires_at: format_utc_rfc3339(verification.expires_at),
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneConfirmRequest {
    verification_id: String,
    phone_number: String,
    code: String,
    /// Expiry reported by `/auth/phone/start`.
    #[serde(default)]
    expires_at: Option<String>,
}

/// Confirm an SMS code and sign in.
async fn phone_confirm(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PhoneConfirmRequest>,
) -> Result<Json<SignInResponse>> {
    let mut verification = PhoneVerification::new(
        req.verification_id,
        req.phone_number,
        chrono::Duration::seconds(state.config.phone_code_ttl_secs),
    );
    if let Some(raw) = req.expires_at.as_deref() {
        verification.expires_at = DateTime::parse_from_rfc3339(raw)
            .map_err(|_| AppError::BadRequest("expiresAt must be RFC 3339".to_string()))?
            .with_timezone(&Utc);
    }

    let credential = Credential::PhoneCode {
        verification,
        code: req.code,
    };
    sign_in(&state, &credential).await.map(Json)
}

// ─── Email ───────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct EmailPasswordRequest {
    email: String,
    password: String,
}

/// Sign in with email and password.
async fn email_sign_in(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EmailPasswordRequest>,
) -> Result<Json<SignInResponse>> {
    let credential = Credential::EmailPassword {
        email: req.email,
        password: req.password,
    };
    sign_in(&state, &credential).await.map(Json)
}

/// Create an email/password account. The new principal is not yet registered.
async fn email_sign_up(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EmailPasswordRequest>,
) -> Result<(StatusCode, Json<SignInResponse>)> {
    let principal = state
        .auth
        .create_email_account(&req.email, &req.password)
        .await?;

    let body = SignInResponse::new(principal, false)?;
    Ok((StatusCode::CREATED, Json(body)))
}

#[derive(Deserialize)]
pub struct PasswordResetRequest {
    email: String,
}

/// Request a password reset email.
///
/// Unknown addresses get the same response as known ones.
async fn password_reset(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PasswordResetRequest>,
) -> Result<StatusCode> {
    use crate::identity::{IdentityError, VerificationFailure};

    match state.auth.send_password_reset(&req.email).await {
        Ok(())
        | Err(IdentityError::VerificationFailed(VerificationFailure::InvalidCredentials)) => {
            Ok(StatusCode::ACCEPTED)
        }
        Err(e) => Err(e.into()),
    }
}

// ─── Session ─────────────────────────────────────────────────

/// Drop the server-side identity session for the caller.
async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> StatusCode {
    state.sessions.end(user.subject());
    StatusCode::NO_CONTENT
}

/// Tokens plus registration status for a fresh sign-in.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub auth_subject_id: String,
    pub id_token: String,
    pub refresh_token: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub expires_in: u64,
    /// Whether a membership record is already bound to this principal.
    pub registered: bool,
}

impl SignInResponse {
    fn new(principal: VerifiedPrincipal, registered: bool) -> Result<Self> {
        let tokens = principal.tokens.ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("auth backend returned no tokens"))
        })?;

        Ok(Self {
            auth_subject_id: principal.auth_subject_id,
            id_token: tokens.id_token,
            refresh_token: tokens.refresh_token,
            expires_in: tokens.expires_in,
            registered,
        })
    }
}

/// Verify `credential` and report whether the principal is registered.
async fn sign_in(state: &AppState, credential: &Credential) -> Result<SignInResponse> {
    let mut session = state.sessions.resolver().session();
    let principal = session.sign_in(state.auth.as_ref(), credential).await?.clone();

    let registered = session
        .resolve(&principal.auth_subject_id)
        .await?
        .is_some();

    tracing::info!(
        auth_subject_id = %principal.auth_subject_id,
        registered,
        "Principal signed in"
    );

    SignInResponse::new(principal, registered)
}
