// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firebase ID token verification for API requests.

use crate::models::VerifiedPrincipal;
use anyhow::Context;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, RwLock};

const JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const CLOCK_SKEW_SECS: u64 = 60;

/// ID token verification error categories.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TokenError {
    /// The token is missing/invalid or claims do not match expectations.
    #[error("invalid ID token: {0}")]
    Invalid(String),
    /// Signing keys could not be fetched.
    #[error("ID token keys unavailable: {0}")]
    Transient(String),
}

#[derive(Clone)]
enum VerifierMode {
    Google,
    StaticKey {
        kid: String,
        algorithm: Algorithm,
        decoding_key: Arc<DecodingKey>,
    },
}

#[derive(Clone)]
struct JwksCacheEntry {
    keys_by_kid: HashMap<String, Arc<DecodingKey>>,
    expires_at: Instant,
}

/// Verifier for Firebase-issued ID tokens.
pub struct FirebaseTokenVerifier {
    http_client: reqwest::Client,
    project_id: String,
    expected_issuer: String,
    mode: VerifierMode,
    jwks_cache: RwLock<Option<JwksCacheEntry>>,
    refresh_lock: Mutex<()>,
}

impl FirebaseTokenVerifier {
    /// Create a production verifier that fetches and caches Google's
    /// securetoken signing keys.
    pub fn new(project_id: &str) -> anyhow::Result<Self> {
        let verifier = Self::build(project_id, VerifierMode::Google)?;

        tracing::info!(
            project = %verifier.project_id,
            issuer = %verifier.expected_issuer,
            "Initialized Firebase ID token verifier"
        );

        Ok(verifier)
    }

    /// Create a verifier with a single static key.
    ///
    /// This is intended for deterministic local/integration tests.
    pub fn new_with_static_key(
        project_id: &str,
        kid: impl Into<String>,
        algorithm: Algorithm,
        decoding_key: DecodingKey,
    ) -> anyhow::Result<Self> {
        let kid = kid.into();
        if kid.trim().is_empty() {
            anyhow::bail!("static ID token kid must not be empty");
        }

        Self::build(
            project_id,
            VerifierMode::StaticKey {
                kid,
                algorithm,
                decoding_key: Arc::new(decoding_key),
            },
        )
    }

    fn build(project_id: &str, mode: VerifierMode) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building JWKS HTTP client")?;

        Ok(Self {
            http_client,
            project_id: project_id.to_string(),
            expected_issuer: format!("https://securetoken.google.com/{}", project_id),
            mode,
            jwks_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Verify a raw ID token and return the principal it names.
    pub async fn verify(&self, token: &str) -> Result<VerifiedPrincipal, TokenError> {
        if token.is_empty() {
            return Err(TokenError::Invalid("token is empty".to_string()));
        }

        let header = decode_header(token)
            .map_err(|e| TokenError::Invalid(format!("invalid JWT header: {e}")))?;

        let algorithm = self.expected_algorithm();
        if header.alg != algorithm {
            return Err(TokenError::Invalid(format!(
                "unexpected JWT alg: {:?}",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| TokenError::Invalid("missing JWT kid".to_string()))?;

        let decoding_key = self.decoding_key_for_kid(&kid).await?;

        let mut validation = Validation::new(algorithm);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&[self.expected_issuer.as_str()]);
        validation.set_audience(&[self.project_id.as_str()]);
        validation.leeway = CLOCK_SKEW_SECS;

        let claims = decode::<FirebaseIdTokenClaims>(token, decoding_key.as_ref(), &validation)
            .map_err(|e| TokenError::Invalid(format!("JWT validation failed: {e}")))?
            .claims;

        if claims.sub.trim().is_empty() {
            return Err(TokenError::Invalid("empty subject".to_string()));
        }

        validate_not_future("iat", claims.iat)?;
        validate_not_future("auth_time", claims.auth_time)?;

        tracing::debug!(
            subject = %claims.sub,
            auth_time = ?claims.auth_time,
            "Firebase ID token verified"
        );

        Ok(VerifiedPrincipal {
            auth_subject_id: claims.sub,
            phone_number: claims.phone_number,
            email: claims.email,
            auth_time: claims.auth_time.map(|t| t as i64),
            tokens: None,
        })
    }

    fn expected_algorithm(&self) -> Algorithm {
        match &self.mode {
            VerifierMode::Google => Algorithm::RS256,
            VerifierMode::StaticKey { algorithm, .. } => *algorithm,
        }
    }

    async fn decoding_key_for_kid(&self, kid: &str) -> Result<Arc<DecodingKey>, TokenError> {
        if let VerifierMode::StaticKey {
            kid: static_kid,
            decoding_key,
            ..
        } = &self.mode
        {
            if kid == static_kid {
                return Ok(decoding_key.clone());
            }
            return Err(TokenError::Invalid(format!(
                "unknown JWT kid for static verifier: {kid}"
            )));
        }

        if let Some(key) = self.lookup_cached_key(kid).await {
            return Ok(key);
        }

        // Keys rotate; a miss on a fresh cache forces one refetch.
        for force_refresh in [false, true] {
            self.refresh_jwks(force_refresh).await?;
            if let Some(key) = self.lookup_cached_key(kid).await {
                return Ok(key);
            }
        }

        Err(TokenError::Invalid(format!(
            "JWT kid not found in JWKS after refresh: {kid}"
        )))
    }

    async fn lookup_cached_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        let cache = self.jwks_cache.read().await;
        let now = Instant::now();
        cache
            .as_ref()
            .filter(|entry| entry.expires_at > now)
            .and_then(|entry| entry.keys_by_kid.get(kid))
            .cloned()
    }

    async fn refresh_jwks(&self, force_refresh: bool) -> Result<(), TokenError> {
        let _guard = self.refresh_lock.lock().await;

        if !force_refresh {
            let cache = self.jwks_cache.read().await;
            if cache
                .as_ref()
                .is_some_and(|entry| entry.expires_at > Instant::now())
            {
                return Ok(());
            }
        }

        tracing::debug!(jwks_uri = JWKS_URL, "Refreshing securetoken JWKS cache");

        let response = self
            .http_client
            .get(JWKS_URL)
            .send()
            .await
            .map_err(|e| TokenError::Transient(format!("JWKS request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(TokenError::Transient(format!(
                "JWKS request returned status {}",
                response.status()
            )));
        }

        let ttl = cache_ttl_from_headers(response.headers(), DEFAULT_CACHE_TTL);

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| TokenError::Transient(format!("invalid JWKS JSON: {e}")))?;

        let mut keys_by_kid: HashMap<String, Arc<DecodingKey>> = HashMap::new();
        for jwk in jwks.keys {
            if jwk.kty != "RSA" || jwk.kid.trim().is_empty() {
                continue;
            }
            if jwk.alg.as_deref().is_some_and(|alg| alg != "RS256") {
                continue;
            }

            match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => {
                    keys_by_kid.insert(jwk.kid, Arc::new(key));
                }
                Err(e) => {
                    tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA JWKS key");
                }
            }
        }

        if keys_by_kid.is_empty() {
            return Err(TokenError::Transient(
                "JWKS response did not include any usable RSA keys".to_string(),
            ));
        }

        *self.jwks_cache.write().await = Some(JwksCacheEntry {
            keys_by_kid,
            expires_at: Instant::now() + ttl,
        });

        tracing::debug!(ttl_secs = ttl.as_secs(), "Securetoken JWKS cache refreshed");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    alg: Option<String>,
    n: String,
    e: String,
}

#[derive(Debug, Deserialize)]
struct FirebaseIdTokenClaims {
    sub: String,
    #[serde(default)]
    iat: Option<u64>,
    #[serde(default)]
    auth_time: Option<u64>,
    #[serde(default)]
    phone_number: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

fn validate_not_future(name: &str, value: Option<u64>) -> Result<(), TokenError> {
    if let Some(ts) = value {
        if ts > now_unix_secs() + CLOCK_SKEW_SECS {
            return Err(TokenError::Invalid(format!("{name} claim is in the future")));
        }
    }
    Ok(())
}

fn cache_ttl_from_headers(headers: &reqwest::header::HeaderMap, fallback: Duration) -> Duration {
    headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_cache_control_max_age)
        .map(Duration::from_secs)
        .unwrap_or(fallback)
}

fn parse_cache_control_max_age(value: &str) -> Option<u64> {
    value.split(',').find_map(|directive| {
        directive
            .trim()
            .strip_prefix("max-age=")
            .and_then(|raw| raw.trim_matches('"').parse::<u64>().ok())
    })
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
