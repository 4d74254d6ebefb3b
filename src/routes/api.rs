// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Membership routes for authenticated principals.

use crate::error::Result;
use crate::identity::{IdentityError, IdentitySession};
use crate::middleware::auth::AuthUser;
use crate::models::{MembershipRecord, ProfileUpdate, RegistrationInput};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication via ID token).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/membership",
            get(get_membership)
                .post(register_membership)
                .patch(update_membership),
        )
        .route("/api/membership/barcode", get(get_barcode))
}

/// Lock the caller's identity session, refreshing its principal.
async fn lock_session(state: &AppState, user: &AuthUser) -> OwnedMutexGuard<IdentitySession> {
    let session = state.sessions.session_for(&user.principal);
    let mut session = session.lock_owned().await;
    session.attach(user.principal.clone());
    session
}

// ─── Membership record ───────────────────────────────────────

/// Membership record as returned to the client.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct MembershipResponse {
    pub membership_id: String,
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
    pub date_of_birth: String,
    pub gender: String,
    pub email: String,
    pub phone: String,
    pub is_active: bool,
    pub is_checked_in: Option<bool>,
    pub last_entry_time: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<MembershipRecord> for MembershipResponse {
    fn from(record: MembershipRecord) -> Self {
        Self {
            membership_id: record.membership_id,
            first_name: record.first_name,
            last_name: record.last_name,
            display_name: record.display_name,
            date_of_birth: record.date_of_birth,
            gender: record.gender,
            email: record.email,
            phone: record.phone,
            is_active: record.is_active,
            is_checked_in: record.is_checked_in,
            last_entry_time: record.last_entry_time,
            created_at: format_utc_rfc3339(record.created_at),
            updated_at: format_utc_rfc3339(record.updated_at),
        }
    }
}

/// Get the caller's membership record.
async fn get_membership(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MembershipResponse>> {
    let mut session = lock_session(&state, &user).await;
    let record = session
        .resolve(user.subject())
        .await?
        .ok_or(IdentityError::RecordNotFound)?;

    Ok(Json(record.into()))
}

// ─── Registration ────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    first_name: String,
    last_name: String,
    email: String,
    date_of_birth: String,
    gender: String,
    /// Defaults to the verified phone number of the caller.
    #[serde(default)]
    phone: Option<String>,
    /// Links an email/password sign-in to a phone-only account.
    #[serde(default)]
    password: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub membership: MembershipResponse,
    /// Whether an email/password credential was attached to the account.
    pub email_linked: bool,
}

/// Create the caller's membership record.
async fn register_membership(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>)> {
    let phone = req
        .phone
        .filter(|p| !p.trim().is_empty())
        .or_else(|| user.principal.phone_number.clone())
        .unwrap_or_default();

    let input = RegistrationInput {
        first_name: req.first_name,
        last_name: req.last_name,
        email: req.email,
        date_of_birth: req.date_of_birth,
        gender: req.gender,
        phone,
    };

    // Only phone-only accounts take an email/password credential.
    let link_password = req
        .password
        .as_deref()
        .filter(|p| !p.is_empty())
        .filter(|_| user.principal.has_phone() && user.principal.email.is_none());

    let record = {
        let mut session = lock_session(&state, &user).await;

        // Link first: a failed link must leave no record behind.
        if let Some(password) = link_password {
            input.validate().map_err(IdentityError::from)?;
            if session.resolve(user.subject()).await?.is_some() {
                return Err(IdentityError::AlreadyRegistered.into());
            }
            state
                .auth
                .link_email_password(&user.id_token, input.email.trim(), password)
                .await?;
            tracing::info!(auth_subject_id = %user.subject(), "Linked email credential");
        }

        session.register(user.subject(), &input).await?
    };

    tracing::info!(
        auth_subject_id = %user.subject(),
        membership_id = %record.membership_id,
        "Membership registered"
    );

    sync_display_name(&state, &user, &record.display_name).await;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            membership: record.into(),
            email_linked: link_password.is_some(),
        }),
    ))
}

// ─── Profile updates ─────────────────────────────────────────

/// Apply a partial profile update.
async fn update_membership(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(update): Json<ProfileUpdate>,
) -> Result<StatusCode> {
    let record = {
        let mut session = lock_session(&state, &user).await;
        session.update_profile(user.subject(), &update).await?
    };

    if update.touches_name() {
        sync_display_name(&state, &user, &record.display_name).await;
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Mirror the record's display name onto the auth account. Failures are logged.
async fn sync_display_name(state: &AppState, user: &AuthUser, display_name: &str) {
    if let Err(e) = state
        .auth
        .set_display_name(&user.id_token, display_name)
        .await
    {
        tracing::warn!(
            auth_subject_id = %user.subject(),
            error = %e,
            "Failed to update account display name"
        );
    }
}

// ─── Barcode ─────────────────────────────────────────────────

/// What the client needs to render the membership QR code.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct BarcodeResponse {
    pub membership_id: String,
    pub display_name: String,
}

async fn get_barcode(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<BarcodeResponse>> {
    let mut session = lock_session(&state, &user).await;
    let record = session
        .resolve(user.subject())
        .await?
        .ok_or(IdentityError::RecordNotFound)?;

    Ok(Json(BarcodeResponse {
        membership_id: record.membership_id,
        display_name: record.display_name,
    }))
}
