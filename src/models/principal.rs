// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credentials and verified principals exchanged with the credential verifier.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Something the caller claims to control.
#[derive(Clone)]
pub enum Credential {
    /// A code sent by SMS for a pending phone verification.
    PhoneCode {
        verification: PhoneVerification,
        code: String,
    },
    /// An email/password pair.
    EmailPassword { email: String, password: String },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::PhoneCode { verification, .. } => f
                .debug_struct("PhoneCode")
                .field("verification", verification)
                .finish_non_exhaustive(),
            Credential::EmailPassword { email, .. } => f
                .debug_struct("EmailPassword")
                .field("email", email)
                .finish_non_exhaustive(),
        }
    }
}

/// Handle for an in-flight phone verification.
///
/// Carries its own expiry so callers can react to the code lapsing instead of
/// waiting for the confirmation to fail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneVerification {
    /// Opaque session info issued by the auth backend.
    pub verification_id: String,
    /// Number the code was sent to (E.164).
    pub phone_number: String,
    pub expires_at: DateTime<Utc>,
}

impl PhoneVerification {
    pub fn new(verification_id: String, phone_number: String, ttl: Duration) -> Self {
        Self {
            verification_id,
            phone_number,
            expires_at: Utc::now() + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Time left before the code lapses (zero once expired).
    pub fn remaining(&self) -> std::time::Duration {
        (self.expires_at - Utc::now()).to_std().unwrap_or_default()
    }

    /// Resolves once the verification has expired.
    ///
    /// Intended for `tokio::select!` against user input.
    pub async fn expired(&self) {
        tokio::time::sleep(self.remaining()).await;
    }
}

/// Tokens issued by the auth backend for a signed-in principal.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    pub id_token: String,
    pub refresh_token: String,
    /// Seconds until `id_token` expires.
    pub expires_in: u64,
}

impl fmt::Debug for AuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthTokens")
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

/// A principal whose credential has been verified.
#[derive(Debug, Clone)]
pub struct VerifiedPrincipal {
    /// Stable subject id issued by the verifier (Firebase uid).
    pub auth_subject_id: String,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    /// Unix time of the sign-in this principal came from, when known.
    pub auth_time: Option<i64>,
    /// Present when the principal came from an interactive sign-in.
    pub tokens: Option<AuthTokens>,
}

impl VerifiedPrincipal {
    pub fn new(auth_subject_id: impl Into<String>) -> Self {
        Self {
            auth_subject_id: auth_subject_id.into(),
            phone_number: None,
            email: None,
            auth_time: None,
            tokens: None,
        }
    }

    pub fn has_phone(&self) -> bool {
        self.phone_number
            .as_deref()
            .is_some_and(|number| !number.is_empty())
    }
}
