//! Application configuration loaded from environment variables.
//!
//! A `.env` file is honored for local development.

use crate::identity::allocator::{DEFAULT_ID_DIGITS, DEFAULT_MAX_ATTEMPTS, MAX_ID_DIGITS};
use crate::identity::{IdentityStrategy, ResolverSettings};
use crate::services::sessions::DEFAULT_SESSION_IDLE_TTL;
use std::env;
use std::time::Duration;

/// Default lifetime of an SMS verification code.
const DEFAULT_PHONE_CODE_TTL_SECS: i64 = 300;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Firebase ---
    /// Firebase/GCP project ID (Firestore project and ID token audience)
    pub firebase_project_id: String,
    /// Web API key for the Identity Toolkit REST API
    pub firebase_api_key: String,

    // --- Server ---
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,

    // --- Identity resolution ---
    pub identity_strategy: IdentityStrategy,
    /// Width of generated membership ids
    pub membership_id_digits: u32,
    /// Collision retries before allocation fails
    pub membership_id_max_attempts: u32,
    /// Treat permission-denied record queries as "not registered"
    pub permission_denied_as_absent: bool,
    /// Seconds an SMS verification code stays valid
    pub phone_code_ttl_secs: i64,
    /// Seconds an unused identity session is kept
    pub session_idle_ttl_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let identity_strategy = match env::var("IDENTITY_STRATEGY") {
            Ok(raw) => raw
                .parse()
                .map_err(|e: String| ConfigError::Invalid("IDENTITY_STRATEGY", e))?,
            Err(_) => IdentityStrategy::default(),
        };

        let membership_id_digits = parse_or("MEMBERSHIP_ID_DIGITS", DEFAULT_ID_DIGITS)?;
        if !(1..=MAX_ID_DIGITS).contains(&membership_id_digits) {
            return Err(ConfigError::Invalid(
                "MEMBERSHIP_ID_DIGITS",
                format!("must be between 1 and {}", MAX_ID_DIGITS),
            ));
        }

        let membership_id_max_attempts =
            parse_or("MEMBERSHIP_ID_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?;
        if membership_id_max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "MEMBERSHIP_ID_MAX_ATTEMPTS",
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            firebase_project_id: env::var("FIREBASE_PROJECT_ID")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("FIREBASE_PROJECT_ID"))?,
            firebase_api_key: env::var("FIREBASE_API_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("FIREBASE_API_KEY"))?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:8081".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            identity_strategy,
            membership_id_digits,
            membership_id_max_attempts,
            permission_denied_as_absent: parse_or("PERMISSION_DENIED_AS_ABSENT", true)?,
            phone_code_ttl_secs: parse_or("PHONE_CODE_TTL_SECS", DEFAULT_PHONE_CODE_TTL_SECS)?,
            session_idle_ttl_secs: parse_or(
                "SESSION_IDLE_TTL_SECS",
                DEFAULT_SESSION_IDLE_TTL.as_secs(),
            )?,
        })
    }

    /// Config for tests only.
    pub fn test_default() -> Self {
        Self {
            firebase_project_id: "test-project".to_string(),
            firebase_api_key: "test-api-key".to_string(),
            frontend_url: "http://localhost:8081".to_string(),
            port: 8080,
            identity_strategy: IdentityStrategy::GeneratedId,
            membership_id_digits: DEFAULT_ID_DIGITS,
            membership_id_max_attempts: DEFAULT_MAX_ATTEMPTS,
            permission_denied_as_absent: true,
            phone_code_ttl_secs: DEFAULT_PHONE_CODE_TTL_SECS,
            session_idle_ttl_secs: DEFAULT_SESSION_IDLE_TTL.as_secs(),
        }
    }

    pub fn session_idle_ttl(&self) -> Duration {
        Duration::from_secs(self.session_idle_ttl_secs)
    }

    /// Identity resolver settings derived from this config.
    pub fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings {
            strategy: self.identity_strategy,
            membership_id_digits: self.membership_id_digits,
            max_allocation_attempts: self.membership_id_max_attempts,
            permission_denied_as_absent: self.permission_denied_as_absent,
        }
    }
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, format!("cannot parse {:?}", raw))),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
