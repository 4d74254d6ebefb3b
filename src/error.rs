// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use crate::identity::{IdentityError, VerificationFailure};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AppError {
    /// Status code, machine-readable error code and client-safe details.
    fn parts(&self) -> (StatusCode, &'static str, Option<String>) {
        match self {
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Identity(err) => identity_parts(err),
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        }
    }
}

fn identity_parts(err: &IdentityError) -> (StatusCode, &'static str, Option<String>) {
    match err {
        IdentityError::VerificationFailed(VerificationFailure::Network(msg)) => {
            tracing::warn!(error = %msg, "Auth provider unreachable");
            (StatusCode::BAD_GATEWAY, "auth_unavailable", None)
        }
        IdentityError::VerificationFailed(reason) => (
            StatusCode::UNAUTHORIZED,
            "verification_failed",
            Some(reason.to_string()),
        ),
        IdentityError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate_limited", None),
        IdentityError::NotAuthenticated => (StatusCode::UNAUTHORIZED, "not_authenticated", None),
        IdentityError::AllocationExhausted { attempts } => {
            tracing::error!(attempts, "Membership id allocation exhausted");
            (StatusCode::SERVICE_UNAVAILABLE, "allocation_exhausted", None)
        }
        IdentityError::RecordNotFound => (StatusCode::NOT_FOUND, "registration_required", None),
        IdentityError::AlreadyRegistered => (StatusCode::CONFLICT, "already_registered", None),
        IdentityError::InvalidInput(msg) => {
            (StatusCode::BAD_REQUEST, "invalid_input", Some(msg.clone()))
        }
        IdentityError::LookupFailed(e) => {
            tracing::error!(error = %e, "Membership record lookup failed");
            (StatusCode::BAD_GATEWAY, "lookup_failed", None)
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = self.parts();

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
