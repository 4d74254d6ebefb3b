// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Membership identity resolution.
//!
//! Ties a verified credential to exactly one membership record:
//! - [`allocator`] hands out unique membership ids
//! - [`locator`] finds a subject's record in strategy order
//! - [`writer`] creates and updates records
//! - [`session`] drives the per-principal state machine

pub mod allocator;
pub mod error;
pub mod locator;
pub mod session;
pub mod strategy;
pub mod verifier;
pub mod writer;

pub use allocator::IdAllocator;
pub use error::{IdentityError, VerificationFailure};
pub use locator::RecordLocator;
pub use session::{IdentityResolver, IdentitySession, ResolverSettings, SessionState};
pub use strategy::{IdentityStrategy, LookupStep};
pub use verifier::{AccountManager, AuthBackend, CredentialVerifier};
pub use writer::RecordWriter;
