// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Membership identity: bind authenticated principals to membership records.
//!
//! This crate provides the backend API that signs members in (SMS code or
//! email/password), resolves the membership record bound to the signed-in
//! principal, and creates or updates that record during onboarding.

pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use identity::AuthBackend;
use services::{FirebaseTokenVerifier, SessionRegistry};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub auth: Arc<dyn AuthBackend>,
    pub token_verifier: Arc<FirebaseTokenVerifier>,
    pub sessions: SessionRegistry,
}
