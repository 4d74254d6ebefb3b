// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP API tests.
//!
//! These tests verify that:
//! 1. Protected routes reject requests without a valid ID token
//! 2. Membership routes map identity outcomes to the right status codes
//! 3. Sign-in routes report whether the principal is registered

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use membership_identity::config::Config;
use membership_identity::identity::IdentityStrategy;
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;
use common::{body_json, create_test_app, create_test_token, create_test_token_for, TestApp};

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn registration() -> Value {
    json!({
        "firstName": "Ann",
        "lastName": "Lee",
        "email": "a@example.com",
        "dateOfBirth": "01/02/1990",
        "gender": "F",
        "phone": "+15551234567"
    })
}

async fn register(app: &TestApp, token: &str) -> Value {
    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::POST,
            "/api/membership",
            Some(token),
            Some(registration()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

// ═══════════════════════════════════════════════════════════════════════════
// AUTHENTICATION
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(request(Method::GET, "/health", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-store"
    );
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["identityStrategy"], "generated-id");
}

#[tokio::test]
async fn test_protected_route_without_token() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(request(Method::GET, "/api/membership", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_rejects_bad_tokens() {
    let app = create_test_app();

    for token in [
        "not-a-jwt".to_string(),
        create_test_token_for("other-project", "auth-1", None),
    ] {
        let response = app
            .router
            .clone()
            .oneshot(request(Method::GET, "/api/membership", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn test_token_accepted_from_cookie() {
    let app = create_test_app();
    let token = create_test_token("auth-1", None);

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/api/membership")
                .header(header::COOKIE, format!("membership_token={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // Authenticated, but not registered yet
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cors_preflight_from_localhost() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/membership")
                .header(header::ORIGIN, "http://localhost:8081")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PATCH")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "http://localhost:8081"
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// MEMBERSHIP
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_unregistered_principal_gets_404() {
    let app = create_test_app();
    let token = create_test_token("auth-123", None);

    let response = app
        .router
        .oneshot(request(Method::GET, "/api/membership", Some(&token), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"], "registration_required");
}

#[tokio::test]
async fn test_register_then_fetch() {
    let app = create_test_app();
    let token = create_test_token("auth-123", Some("+15551234567"));

    let created = register(&app, &token).await;
    let membership_id = created["membership"]["membershipId"].as_str().unwrap();
    assert_eq!(membership_id.len(), 10);
    assert_eq!(created["membership"]["displayName"], "Ann Lee");
    assert_eq!(created["membership"]["isActive"], true);
    assert_eq!(created["emailLinked"], false);

    let response = app
        .router
        .clone()
        .oneshot(request(Method::GET, "/api/membership", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = body_json(response).await;
    assert_eq!(fetched["membershipId"], membership_id);
    assert_eq!(fetched["phone"], "5551234567");

    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::GET,
            "/api/membership/barcode",
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let barcode = body_json(response).await;
    assert_eq!(barcode["membershipId"], membership_id);
    assert_eq!(barcode["displayName"], "Ann Lee");

    assert!(app
        .auth
        .calls()
        .contains(&"set_display_name:Ann Lee".to_string()));
    assert_eq!(app.store.len(), 1);
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let app = create_test_app();
    let token = create_test_token("auth-1", None);
    register(&app, &token).await;

    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::POST,
            "/api/membership",
            Some(&token),
            Some(registration()),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(app.store.len(), 1);
}

#[tokio::test]
async fn test_invalid_registration_is_bad_request() {
    let app = create_test_app();
    let token = create_test_token("auth-1", None);

    let mut body = registration();
    body["dateOfBirth"] = json!("02/30/2099");

    let response = app
        .router
        .oneshot(request(
            Method::POST,
            "/api/membership",
            Some(&token),
            Some(body),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "invalid_input");
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_registration_defaults_phone_and_links_email() {
    let app = create_test_app();
    let token = create_test_token("phone-only", Some("+15557654321"));

    let mut body = registration();
    body.as_object_mut().unwrap().remove("phone");
    body["password"] = json!("hunter22");

    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::POST,
            "/api/membership",
            Some(&token),
            Some(body),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["membership"]["phone"], "5557654321");
    assert_eq!(created["emailLinked"], true);
    assert!(app
        .auth
        .calls()
        .contains(&"link_email_password:a@example.com".to_string()));
}

#[tokio::test]
async fn test_failed_email_link_writes_no_record() {
    let app = create_test_app();
    app.auth
        .add_email_account("a@example.com", "taken-pass", "someone-else");
    let token = create_test_token("phone-only", Some("+15557654321"));

    let mut body = registration();
    body["password"] = json!("hunter22");

    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::POST,
            "/api/membership",
            Some(&token),
            Some(body.clone()),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let error = body_json(response).await;
    assert_eq!(error["error"], "verification_failed");
    assert!(app.store.is_empty());

    // Invalid input is rejected before the backend is asked to link.
    let mut invalid = body.clone();
    invalid["dateOfBirth"] = json!("02/30/1990");
    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::POST,
            "/api/membership",
            Some(&token),
            Some(invalid),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.store.is_empty());

    // The caller is still unregistered and can retry with another email.
    body["email"] = json!("ann.lee@example.com");
    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::POST,
            "/api/membership",
            Some(&token),
            Some(body),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["emailLinked"], true);
    assert_eq!(app.store.len(), 1);
    assert_eq!(
        app.auth
            .calls()
            .iter()
            .filter(|call| call.starts_with("link_email_password"))
            .collect::<Vec<_>>(),
        vec!["link_email_password:ann.lee@example.com"]
    );
}

#[tokio::test]
async fn test_profile_update() {
    let app = create_test_app();
    let token = create_test_token("auth-123", None);
    let created = register(&app, &token).await;

    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::PATCH,
            "/api/membership",
            Some(&token),
            Some(json!({ "lastName": "Smith" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .router
        .clone()
        .oneshot(request(Method::GET, "/api/membership", Some(&token), None))
        .await
        .unwrap();
    let fetched = body_json(response).await;
    assert_eq!(fetched["displayName"], "Ann Smith");
    assert_eq!(fetched["membershipId"], created["membership"]["membershipId"]);
    assert!(
        fetched["updatedAt"].as_str().unwrap()
            > created["membership"]["updatedAt"].as_str().unwrap()
    );
    assert!(app
        .auth
        .calls()
        .contains(&"set_display_name:Ann Smith".to_string()));
}

#[tokio::test]
async fn test_profile_update_errors() {
    let app = create_test_app();
    let token = create_test_token("auth-1", None);

    // Not registered
    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::PATCH,
            "/api/membership",
            Some(&token),
            Some(json!({ "firstName": "X" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(app.store.is_empty());

    register(&app, &token).await;

    // Empty update
    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::PATCH,
            "/api/membership",
            Some(&token),
            Some(json!({})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Fields outside the profile
    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::PATCH,
            "/api/membership",
            Some(&token),
            Some(json!({ "membershipId": "0000000000" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_auto_id_strategy_over_http() {
    let config = Config {
        identity_strategy: IdentityStrategy::AutoIdWithFieldBinding,
        ..Config::test_default()
    };
    let app = common::create_test_app_with_config(config);
    let token = create_test_token("auth-1", None);

    let created = register(&app, &token).await;
    let membership_id = created["membership"]["membershipId"].as_str().unwrap();
    assert_eq!(membership_id.len(), 20);
    assert!(app.store.get(membership_id).is_some());

    // A new sign-in starts a fresh session and must find the record by field.
    app.state.sessions.end("auth-1");
    let response = app
        .router
        .clone()
        .oneshot(request(Method::GET, "/api/membership", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["membershipId"], membership_id);
}

#[tokio::test]
async fn test_store_outage_is_bad_gateway() {
    let app = create_test_app();
    app.store.set_offline(true);
    let token = create_test_token("auth-1", None);

    let response = app
        .router
        .oneshot(request(Method::GET, "/api/membership", Some(&token), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["error"], "lookup_failed");
    assert!(body.get("details").is_none());
}

// ═══════════════════════════════════════════════════════════════════════════
// SIGN-IN
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_phone_sign_in_flow() {
    let app = create_test_app();
    app.auth.add_phone_user("+15551234567", "auth-phone");

    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::POST,
            "/auth/phone/start",
            None,
            Some(json!({ "phoneNumber": "+15551234567", "recaptchaToken": "captcha" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let started = body_json(response).await;
    let verification_id = started["verificationId"].as_str().unwrap().to_string();
    let expires_at = started["expiresAt"].as_str().unwrap().to_string();

    let confirm = |code: &str| {
        json!({
            "verificationId": verification_id,
            "phoneNumber": "+15551234567",
            "code": code,
            "expiresAt": expires_at,
        })
    };

    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::POST,
            "/auth/phone/confirm",
            None,
            Some(confirm("999999")),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "verification_failed");

    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::POST,
            "/auth/phone/confirm",
            None,
            Some(confirm(common::VALID_CODE)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let signed_in = body_json(response).await;
    assert_eq!(signed_in["authSubjectId"], "auth-phone");
    assert_eq!(signed_in["registered"], false);
    assert!(signed_in["idToken"].as_str().is_some());

    // Register through the API, then sign in again
    register(&app, &create_test_token("auth-phone", Some("+15551234567"))).await;

    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::POST,
            "/auth/phone/confirm",
            None,
            Some(confirm(common::VALID_CODE)),
        ))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["registered"], true);
}

#[tokio::test]
async fn test_phone_confirm_after_expiry() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(request(
            Method::POST,
            "/auth/phone/confirm",
            None,
            Some(json!({
                "verificationId": "session-1",
                "phoneNumber": "+15551234567",
                "code": common::VALID_CODE,
                "expiresAt": "2020-01-01T00:00:00Z",
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "verification_failed");
    assert!(body["details"].as_str().unwrap().contains("expired"));
}

#[tokio::test]
async fn test_rate_limited_phone_start() {
    let app = create_test_app();
    app.auth.set_rate_limited(true);

    let response = app
        .router
        .oneshot(request(
            Method::POST,
            "/auth/phone/start",
            None,
            Some(json!({ "phoneNumber": "+15551234567" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_email_sign_up_and_sign_in() {
    let app = create_test_app();
    let credentials = json!({ "email": "b@example.com", "password": "hunter22" });

    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::POST,
            "/auth/email/signup",
            None,
            Some(credentials.clone()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let signed_up = body_json(response).await;
    assert_eq!(signed_up["registered"], false);

    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::POST,
            "/auth/email/signup",
            None,
            Some(credentials.clone()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::POST,
            "/auth/email/signin",
            None,
            Some(credentials),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let signed_in = body_json(response).await;
    assert_eq!(signed_in["authSubjectId"], signed_up["authSubjectId"]);

    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::POST,
            "/auth/email/signin",
            None,
            Some(json!({ "email": "b@example.com", "password": "wrong" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_password_reset_does_not_reveal_accounts() {
    let app = create_test_app();
    app.auth
        .add_email_account("known@example.com", "hunter22", "auth-1");

    for email in ["known@example.com", "unknown@example.com"] {
        let response = app
            .router
            .clone()
            .oneshot(request(
                Method::POST,
                "/auth/password-reset",
                None,
                Some(json!({ "email": email })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }
    assert_eq!(app.auth.calls(), vec!["send_password_reset".to_string()]);
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = create_test_app();
    let token = create_test_token("auth-1", None);

    let response = app
        .router
        .clone()
        .oneshot(request(Method::GET, "/api/membership", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.state.sessions.len(), 1);

    let response = app
        .router
        .clone()
        .oneshot(request(Method::POST, "/auth/logout", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(app.state.sessions.is_empty());

    let response = app
        .router
        .oneshot(request(Method::POST, "/auth/logout", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
