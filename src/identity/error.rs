// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity resolution error taxonomy.

use crate::db::StoreError;

/// Why a credential could not be verified.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationFailure {
    /// Wrong SMS code.
    #[error("invalid verification code")]
    InvalidCode,
    /// SMS code or verification session lapsed.
    #[error("verification code expired")]
    CodeExpired,
    /// Wrong email/password.
    #[error("invalid email or password")]
    InvalidCredentials,
    /// Email already registered to another account.
    #[error("email address already in use")]
    EmailInUse,
    #[error("password is too weak")]
    WeakPassword,
    #[error("invalid email address")]
    InvalidEmail,
    #[error("invalid phone number")]
    InvalidPhoneNumber,
    /// The verifier could not be reached.
    #[error("network error: {0}")]
    Network(String),
    /// Any other backend rejection (raw backend code).
    #[error("rejected by auth backend: {0}")]
    Other(String),
}

/// Errors surfaced by the identity resolver.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// Recoverable: the user retries with a new code or password.
    #[error("Verification failed: {0}")]
    VerificationFailed(VerificationFailure),

    /// Recoverable after backoff.
    #[error("Too many attempts, try again later")]
    RateLimited,

    /// Sequencing error: the operation needs a verified principal.
    #[error("No authenticated principal for this operation")]
    NotAuthenticated,

    /// Every generated membership id collided; nothing was written.
    #[error("Could not allocate a unique membership id after {attempts} attempts")]
    AllocationExhausted { attempts: u32 },

    #[error("No membership record for this principal")]
    RecordNotFound,

    #[error("A membership record already exists for this principal")]
    AlreadyRegistered,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Record lookup failed: {0}")]
    LookupFailed(#[from] StoreError),
}

impl From<validator::ValidationErrors> for IdentityError {
    fn from(errors: validator::ValidationErrors) -> Self {
        IdentityError::InvalidInput(errors.to_string())
    }
}

/// Result alias for identity operations.
pub type Result<T> = std::result::Result<T, IdentityError>;
