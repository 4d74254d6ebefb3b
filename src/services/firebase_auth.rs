// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firebase Authentication client (Identity Toolkit REST API).
//!
//! Handles:
//! - SMS code delivery and confirmation
//! - Email/password sign-in and sign-up
//! - Linking an email/password credential to a phone account
//! - Display name updates and password reset emails
//!
//! Backend error codes are mapped onto [`IdentityError`] so callers can tell
//! a wrong code from a rate limit.

use crate::identity::error::{IdentityError, Result};
use crate::identity::{AccountManager, CredentialVerifier, VerificationFailure};
use crate::models::{AuthTokens, Credential, PhoneVerification, VerifiedPrincipal};
use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Identity Toolkit client bound to one project's web API key.
#[derive(Clone)]
pub struct FirebaseAuthClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    phone_code_ttl: chrono::Duration,
}

impl FirebaseAuthClient {
    /// Create a client for the production endpoint.
    ///
    /// For local development with the Auth emulator, set
    /// FIREBASE_AUTH_EMULATOR_HOST.
    pub fn new(api_key: impl Into<String>, phone_code_ttl_secs: i64) -> anyhow::Result<Self> {
        let base_url = match std::env::var("FIREBASE_AUTH_EMULATOR_HOST") {
            Ok(host) => {
                tracing::info!(host = %host, "Using Firebase Auth emulator");
                format!("http://{}/identitytoolkit.googleapis.com/v1", host)
            }
            Err(_) => IDENTITY_TOOLKIT_URL.to_string(),
        };
        Self::with_base_url(api_key, base_url, phone_code_ttl_secs)
    }

    /// Create a client against an explicit Identity Toolkit base URL.
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        phone_code_ttl_secs: i64,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building Firebase Auth HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            phone_code_ttl: chrono::Duration::seconds(phone_code_ttl_secs),
        })
    }

    /// POST `body` to `accounts:{method}` and decode the JSON response.
    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}/accounts:{}", self.base_url, method);

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(method, error = %e, "Firebase Auth request failed");
                IdentityError::VerificationFailed(VerificationFailure::Network(e.to_string()))
            })?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|e| {
                IdentityError::VerificationFailed(VerificationFailure::Network(format!(
                    "invalid response body: {}",
                    e
                )))
            });
        }

        if status.as_u16() == 429 {
            tracing::warn!(method, "Firebase Auth rate limit hit (429)");
            return Err(IdentityError::RateLimited);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .map(|envelope| envelope.error.message)
            .unwrap_or_else(|_| format!("HTTP {}", status));

        tracing::info!(method, status = %status, code = %message, "Firebase Auth rejected request");
        Err(map_backend_error(&message))
    }

    async fn sign_in_with_phone(
        &self,
        verification: &PhoneVerification,
        code: &str,
    ) -> Result<VerifiedPrincipal> {
        if verification.is_expired() {
            return Err(IdentityError::VerificationFailed(
                VerificationFailure::CodeExpired,
            ));
        }

        let response: SignInResponse = self
            .call(
                "signInWithPhoneNumber",
                &PhoneSignInRequest {
                    session_info: &verification.verification_id,
                    code: code.trim(),
                },
            )
            .await?;

        Ok(response.into_principal())
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<VerifiedPrincipal> {
        let response: SignInResponse = self
            .call(
                "signInWithPassword",
                &EmailPasswordRequest {
                    email: email.trim(),
                    password,
                    return_secure_token: true,
                },
            )
            .await?;

        Ok(response.into_principal())
    }
}

#[async_trait]
impl CredentialVerifier for FirebaseAuthClient {
    async fn send_phone_code(
        &self,
        phone_number: &str,
        recaptcha_token: Option<&str>,
    ) -> Result<PhoneVerification> {
        let phone_number = phone_number.trim();
        let response: SendCodeResponse = self
            .call(
                "sendVerificationCode",
                &SendCodeRequest {
                    phone_number,
                    recaptcha_token,
                },
            )
            .await?;

        tracing::info!("Phone verification code sent");
        Ok(PhoneVerification::new(
            response.session_info,
            phone_number.to_string(),
            self.phone_code_ttl,
        ))
    }

    async fn verify(&self, credential: &Credential) -> Result<VerifiedPrincipal> {
        match credential {
            Credential::PhoneCode { verification, code } => {
                self.sign_in_with_phone(verification, code).await
            }
            Credential::EmailPassword { email, password } => {
                self.sign_in_with_password(email, password).await
            }
        }
    }
}

#[async_trait]
impl AccountManager for FirebaseAuthClient {
    async fn create_email_account(&self, email: &str, password: &str) -> Result<VerifiedPrincipal> {
        let response: SignInResponse = self
            .call(
                "signUp",
                &EmailPasswordRequest {
                    email: email.trim(),
                    password,
                    return_secure_token: true,
                },
            )
            .await?;

        tracing::info!(auth_subject_id = %response.local_id, "Email account created");
        Ok(response.into_principal())
    }

    async fn link_email_password(&self, id_token: &str, email: &str, password: &str) -> Result<()> {
        let _: serde_json::Value = self
            .call(
                "update",
                &AccountUpdateRequest {
                    id_token,
                    email: Some(email.trim()),
                    password: Some(password),
                    display_name: None,
                    return_secure_token: false,
                },
            )
            .await?;

        tracing::info!("Email credential linked to account");
        Ok(())
    }

    async fn set_display_name(&self, id_token: &str, display_name: &str) -> Result<()> {
        let _: serde_json::Value = self
            .call(
                "update",
                &AccountUpdateRequest {
                    id_token,
                    email: None,
                    password: None,
                    display_name: Some(display_name),
                    return_secure_token: false,
                },
            )
            .await?;
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<()> {
        let _: serde_json::Value = self
            .call(
                "sendOobCode",
                &OobCodeRequest {
                    request_type: "PASSWORD_RESET",
                    email: email.trim(),
                },
            )
            .await?;

        tracing::info!("Password reset email requested");
        Ok(())
    }
}

/// Map an Identity Toolkit error message (`CODE` or `CODE : detail`).
pub fn map_backend_error(message: &str) -> IdentityError {
    let code = message.split(" : ").next().unwrap_or(message).trim();

    let failure = match code {
        "TOO_MANY_ATTEMPTS_TRY_LATER" | "QUOTA_EXCEEDED" => return IdentityError::RateLimited,
        "INVALID_CODE" => VerificationFailure::InvalidCode,
        "SESSION_EXPIRED" | "CODE_EXPIRED" => VerificationFailure::CodeExpired,
        "INVALID_PASSWORD" | "EMAIL_NOT_FOUND" | "INVALID_LOGIN_CREDENTIALS" | "USER_DISABLED" => {
            VerificationFailure::InvalidCredentials
        }
        "EMAIL_EXISTS" => VerificationFailure::EmailInUse,
        "WEAK_PASSWORD" => VerificationFailure::WeakPassword,
        "INVALID_EMAIL" => VerificationFailure::InvalidEmail,
        "INVALID_PHONE_NUMBER" | "MISSING_PHONE_NUMBER" => VerificationFailure::InvalidPhoneNumber,
        "INVALID_ID_TOKEN" | "TOKEN_EXPIRED" | "USER_NOT_FOUND" => {
            return IdentityError::NotAuthenticated
        }
        other => VerificationFailure::Other(other.to_string()),
    };

    IdentityError::VerificationFailed(failure)
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendCodeRequest<'a> {
    phone_number: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    recaptcha_token: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendCodeResponse {
    session_info: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PhoneSignInRequest<'a> {
    session_info: &'a str,
    code: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailPasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AccountUpdateRequest<'a> {
    id_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<&'a str>,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OobCodeRequest<'a> {
    request_type: &'a str,
    email: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    id_token: String,
    refresh_token: String,
    /// Seconds, encoded as a string.
    #[serde(default)]
    expires_in: Option<String>,
    #[serde(default)]
    phone_number: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

impl SignInResponse {
    fn into_principal(self) -> VerifiedPrincipal {
        let auth_time = token_auth_time(&self.id_token);

        VerifiedPrincipal {
            auth_subject_id: self.local_id,
            phone_number: self.phone_number.filter(|p| !p.is_empty()),
            email: self.email.filter(|e| !e.is_empty()),
            auth_time,
            tokens: Some(AuthTokens {
                id_token: self.id_token,
                refresh_token: self.refresh_token,
                expires_in: self
                    .expires_in
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            }),
        }
    }
}

#[derive(Deserialize)]
struct AuthTimeClaim {
    auth_time: Option<i64>,
}

/// Read the `auth_time` claim from an ID token the backend just minted.
///
/// The signature is not checked here; the token came straight from the
/// Identity Toolkit response. Requests carrying it are verified separately.
fn token_auth_time(id_token: &str) -> Option<i64> {
    use jsonwebtoken::{decode, DecodingKey, Validation};

    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<AuthTimeClaim>(id_token, &DecodingKey::from_secret(&[]), &validation)
        .ok()
        .and_then(|data| data.claims.auth_time)
}
