// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - integrations and session bookkeeping.

pub mod firebase_auth;
pub mod id_token;
pub mod sessions;

pub use firebase_auth::FirebaseAuthClient;
pub use id_token::{FirebaseTokenVerifier, TokenError};
pub use sessions::SessionRegistry;
