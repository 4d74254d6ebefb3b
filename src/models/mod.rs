// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod membership;
pub mod principal;

pub use membership::{MembershipRecord, ProfileUpdate, RegistrationInput};
pub use principal::{AuthTokens, Credential, PhoneVerification, VerifiedPrincipal};
