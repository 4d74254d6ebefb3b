// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Response;
use dashmap::DashMap;
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use membership_identity::config::Config;
use membership_identity::db::{FirestoreDb, MemoryStore};
use membership_identity::identity::{
    AccountManager, CredentialVerifier, IdentityError, IdentityResolver, VerificationFailure,
};
use membership_identity::models::{AuthTokens, Credential, PhoneVerification, VerifiedPrincipal};
use membership_identity::routes::create_router;
use membership_identity::services::{FirebaseTokenVerifier, SessionRegistry};
use membership_identity::AppState;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

type IdentityResult<T> = Result<T, IdentityError>;

#[allow(dead_code)]
pub const TEST_KID: &str = "test-kid";
#[allow(dead_code)]
pub const TEST_TOKEN_SECRET: &[u8] = b"membership-test-secret";
/// SMS code the fake auth backend accepts.
#[allow(dead_code)]
pub const VALID_CODE: &str = "123456";

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// In-process stand-in for Firebase Authentication.
#[allow(dead_code)]
#[derive(Default)]
pub struct FakeAuthBackend {
    /// email -> (password, uid)
    accounts: DashMap<String, (String, String)>,
    /// phone number -> uid
    phone_users: DashMap<String, String>,
    rate_limited: AtomicBool,
    next_uid: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl FakeAuthBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_email_account(&self, email: &str, password: &str, uid: &str) {
        self.accounts
            .insert(email.to_string(), (password.to_string(), uid.to_string()));
    }

    pub fn add_phone_user(&self, phone_number: &str, uid: &str) {
        self.phone_users
            .insert(phone_number.to_string(), uid.to_string());
    }

    pub fn set_rate_limited(&self, limited: bool) {
        self.rate_limited.store(limited, Ordering::SeqCst);
    }

    /// Names of account operations invoked, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn new_uid(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_uid.fetch_add(1, Ordering::SeqCst))
    }

    fn check_rate_limit(&self) -> IdentityResult<()> {
        if self.rate_limited.load(Ordering::SeqCst) {
            return Err(IdentityError::RateLimited);
        }
        Ok(())
    }

    fn principal(uid: &str, phone: Option<&str>, email: Option<&str>) -> VerifiedPrincipal {
        let mut principal = VerifiedPrincipal::new(uid);
        principal.phone_number = phone.map(str::to_string);
        principal.email = email.map(str::to_string);
        principal.auth_time = Some(now_secs() as i64);
        principal.tokens = Some(AuthTokens {
            id_token: format!("id-token-{}", uid),
            refresh_token: format!("refresh-{}", uid),
            expires_in: 3600,
        });
        principal
    }
}

#[async_trait]
impl CredentialVerifier for FakeAuthBackend {
    async fn send_phone_code(
        &self,
        phone_number: &str,
        _recaptcha_token: Option<&str>,
    ) -> IdentityResult<PhoneVerification> {
        self.check_rate_limit()?;
        if !phone_number.starts_with('+') {
            return Err(IdentityError::VerificationFailed(
                VerificationFailure::InvalidPhoneNumber,
            ));
        }
        self.record("send_phone_code");
        Ok(PhoneVerification::new(
            format!("session-{}", phone_number),
            phone_number.to_string(),
            chrono::Duration::minutes(5),
        ))
    }

    async fn verify(&self, credential: &Credential) -> IdentityResult<VerifiedPrincipal> {
        self.check_rate_limit()?;
        match credential {
            Credential::PhoneCode { verification, code } => {
                if verification.is_expired() {
                    return Err(IdentityError::VerificationFailed(
                        VerificationFailure::CodeExpired,
                    ));
                }
                if code != VALID_CODE {
                    return Err(IdentityError::VerificationFailed(
                        VerificationFailure::InvalidCode,
                    ));
                }
                let number = verification.phone_number.clone();
                let uid = self
                    .phone_users
                    .entry(number.clone())
                    .or_insert_with(|| self.new_uid("phone-uid"))
                    .clone();
                Ok(Self::principal(&uid, Some(number.as_str()), None))
            }
            Credential::EmailPassword { email, password } => match self.accounts.get(email) {
                Some(account) if account.0 == *password => {
                    Ok(Self::principal(&account.1, None, Some(email.as_str())))
                }
                _ => Err(IdentityError::VerificationFailed(
                    VerificationFailure::InvalidCredentials,
                )),
            },
        }
    }
}

#[async_trait]
impl AccountManager for FakeAuthBackend {
    async fn create_email_account(
        &self,
        email: &str,
        password: &str,
    ) -> IdentityResult<VerifiedPrincipal> {
        if self.accounts.contains_key(email) {
            return Err(IdentityError::VerificationFailed(
                VerificationFailure::EmailInUse,
            ));
        }
        if password.len() < 6 {
            return Err(IdentityError::VerificationFailed(
                VerificationFailure::WeakPassword,
            ));
        }
        let uid = self.new_uid("email-uid");
        self.add_email_account(email, password, &uid);
        self.record("create_email_account");
        Ok(Self::principal(&uid, None, Some(email)))
    }

    async fn link_email_password(
        &self,
        _id_token: &str,
        email: &str,
        _password: &str,
    ) -> IdentityResult<()> {
        if self.accounts.contains_key(email) {
            return Err(IdentityError::VerificationFailed(
                VerificationFailure::EmailInUse,
            ));
        }
        self.record(format!("link_email_password:{}", email));
        Ok(())
    }

    async fn set_display_name(&self, _id_token: &str, display_name: &str) -> IdentityResult<()> {
        self.record(format!("set_display_name:{}", display_name));
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> IdentityResult<()> {
        if !self.accounts.contains_key(email) {
            return Err(IdentityError::VerificationFailed(
                VerificationFailure::InvalidCredentials,
            ));
        }
        self.record("send_password_reset");
        Ok(())
    }
}

/// Test app with offline dependencies and handles to inspect them.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub store: MemoryStore,
    pub auth: Arc<FakeAuthBackend>,
}

/// Create a test app over an in-memory store with the default config.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with_config(Config::test_default())
}

/// Create a test app over an in-memory store.
#[allow(dead_code)]
pub fn create_test_app_with_config(config: Config) -> TestApp {
    let store = MemoryStore::new();
    let auth = Arc::new(FakeAuthBackend::new());

    let token_verifier = FirebaseTokenVerifier::new_with_static_key(
        &config.firebase_project_id,
        TEST_KID,
        Algorithm::HS256,
        DecodingKey::from_secret(TEST_TOKEN_SECRET),
    )
    .expect("static verifier");

    let resolver = IdentityResolver::new(Arc::new(store.clone()), &config.resolver_settings());
    let sessions = SessionRegistry::new(resolver).with_idle_ttl(config.session_idle_ttl());

    let state = Arc::new(AppState {
        config,
        auth: auth.clone(),
        token_verifier: Arc::new(token_verifier),
        sessions,
    });

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        auth,
    }
}

#[derive(Serialize)]
struct TestClaims<'a> {
    iss: String,
    aud: &'a str,
    sub: &'a str,
    exp: u64,
    iat: u64,
    auth_time: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone_number: Option<&'a str>,
}

/// Create a Firebase-shaped ID token accepted by the test app.
#[allow(dead_code)]
pub fn create_test_token(subject: &str, phone_number: Option<&str>) -> String {
    create_test_token_for("test-project", subject, phone_number)
}

/// Create an ID token for an arbitrary project (audience).
#[allow(dead_code)]
pub fn create_test_token_for(project: &str, subject: &str, phone_number: Option<&str>) -> String {
    let now = now_secs();
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(TEST_KID.to_string());

    encode(
        &header,
        &TestClaims {
            iss: format!("https://securetoken.google.com/{}", project),
            aud: project,
            sub: subject,
            exp: now + 3600,
            iat: now,
            auth_time: now - 30,
            phone_number,
        },
        &EncodingKey::from_secret(TEST_TOKEN_SECRET),
    )
    .unwrap()
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
