// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Membership API Server
//!
//! Signs members in through Firebase Authentication and resolves the
//! Firestore membership record bound to each signed-in principal.

use membership_identity::{
    config::Config,
    db::FirestoreDb,
    identity::IdentityResolver,
    services::{FirebaseAuthClient, FirebaseTokenVerifier, SessionRegistry},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        strategy = config.identity_strategy.as_str(),
        "Starting membership API"
    );

    let db = FirestoreDb::new(&config.firebase_project_id).await?;

    let resolver = IdentityResolver::new(Arc::new(db), &config.resolver_settings());
    let sessions = SessionRegistry::new(resolver).with_idle_ttl(config.session_idle_ttl());

    let auth = FirebaseAuthClient::new(&config.firebase_api_key, config.phone_code_ttl_secs)?;
    let token_verifier = Arc::new(FirebaseTokenVerifier::new(&config.firebase_project_id)?);

    let state = Arc::new(AppState {
        config: config.clone(),
        auth: Arc::new(auth),
        token_verifier,
        sessions,
    });

    let app = membership_identity::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("membership_identity=debug,info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
