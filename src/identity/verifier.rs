// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Seams to the external authentication provider.

use super::error::Result;
use crate::models::{Credential, PhoneVerification, VerifiedPrincipal};
use async_trait::async_trait;

/// Proves control of a phone number or email/password pair.
///
/// Implementations do not retry; retry and backoff belong to the caller.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Send an SMS code and return the handle needed to confirm it.
    async fn send_phone_code(
        &self,
        phone_number: &str,
        recaptcha_token: Option<&str>,
    ) -> Result<PhoneVerification>;

    /// Verify a credential and return the principal it belongs to.
    async fn verify(&self, credential: &Credential) -> Result<VerifiedPrincipal>;
}

/// Account-level operations on the auth provider used during onboarding.
#[async_trait]
pub trait AccountManager: Send + Sync {
    /// Create a new email/password account.
    async fn create_email_account(&self, email: &str, password: &str)
        -> Result<VerifiedPrincipal>;

    /// Attach an email/password credential to the signed-in account.
    async fn link_email_password(&self, id_token: &str, email: &str, password: &str)
        -> Result<()>;

    /// Set the provider-side display name of the signed-in account.
    async fn set_display_name(&self, id_token: &str, display_name: &str) -> Result<()>;

    /// Email a password reset link.
    async fn send_password_reset(&self, email: &str) -> Result<()>;
}

/// Everything the service needs from the auth provider.
pub trait AuthBackend: CredentialVerifier + AccountManager {}

impl<T: CredentialVerifier + AccountManager> AuthBackend for T {}
