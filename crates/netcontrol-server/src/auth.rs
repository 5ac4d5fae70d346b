//! Token issuance and verification, and password hashing.
//!
//! Tokens are HS256 JWTs carrying `sub`, `iat` and `exp`. Signature checks
//! are left to `jsonwebtoken`; expiry is checked here against the injected
//! clock so tests can pin time.
//!
//! Passwords are stored as Argon2id PHC strings with a random per-record salt.

use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use netcontrol_core::auth::Claims;
use netcontrol_core::clock::{Clock, SystemClock};
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};

/// Used when `JWT_SECRET` is unset. Fine for local development only.
pub const INSECURE_DEFAULT_SECRET: &str = "INSECURE_DEFAULT_SECRET_CHANGE_IN_PRODUCTION";

/// Token lifetime: one hour.
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

// ============================================================================
// JWT SECRET
// ============================================================================

/// Signing secret that never shows up in logs.
#[derive(Clone)]
pub struct JwtSecret(SecretString);

impl JwtSecret {
    /// An empty or blank secret falls back to the insecure default.
    pub fn new(secret: impl Into<String>) -> Self {
        let secret = secret.into();
        let secret = if secret.trim().is_empty() {
            INSECURE_DEFAULT_SECRET.to_string()
        } else {
            secret
        };
        Self(SecretString::new(secret.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn len(&self) -> usize {
        self.0.expose_secret().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }

    pub fn is_insecure_default(&self) -> bool {
        self.0.expose_secret() == INSECURE_DEFAULT_SECRET
    }
}

impl std::fmt::Debug for JwtSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JwtSecret([REDACTED, {} chars])", self.len())
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: JwtSecret,

    /// Lifetime of issued tokens in seconds
    pub jwt_expiration_secs: i64,

    /// Clock for `iat`/`exp` (injected for testing)
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret)
            .field("jwt_expiration_secs", &self.jwt_expiration_secs)
            .field("clock", &"<Clock>")
            .finish()
    }
}

impl AuthConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: JwtSecret::new(secret),
            jwt_expiration_secs: DEFAULT_TOKEN_LIFETIME_SECS,
            clock: Arc::new(SystemClock),
        }
    }

    /// # Environment Variables
    /// - `JWT_SECRET`: signing secret (insecure default when unset)
    /// - `JWT_EXPIRATION_SECS`: token lifetime (default: 3600)
    pub fn from_env() -> Self {
        let secret = std::env::var("JWT_SECRET").unwrap_or_default();
        let mut config = Self::new(secret);
        config.jwt_expiration_secs = std::env::var("JWT_EXPIRATION_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        config
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_expiration_secs(mut self, secs: i64) -> Self {
        self.jwt_expiration_secs = secs;
        self
    }

    /// Log a warning when the secret is unsuitable for anything but local use.
    pub fn warn_if_insecure(&self) {
        if self.jwt_secret.is_insecure_default() {
            warn!(
                "Using the insecure default JWT secret. Set JWT_SECRET to a random value \
                 of at least 32 characters before deploying."
            );
        } else if self.jwt_secret.len() < 32 {
            warn!(
                length = self.jwt_secret.len(),
                "JWT secret is short; use at least 32 characters"
            );
        }
    }
}

// ============================================================================
// TOKENS
// ============================================================================

/// Sign a token for `user_id` valid for the configured lifetime.
pub fn issue_token(config: &AuthConfig, user_id: &str) -> ApiResult<String> {
    let claims = Claims::new(user_id, config.jwt_expiration_secs, config.clock.as_ref());
    let key = EncodingKey::from_secret(config.jwt_secret.expose().as_bytes());
    encode(&Header::new(Algorithm::HS256), &claims, &key)
        .map_err(|e| ApiError::internal_error(format!("Failed to generate token: {}", e)))
}

/// Verify the signature, then check `exp` against the configured clock.
///
/// Any failure (malformed, bad signature, missing or past `exp`) is
/// `InvalidToken`.
pub fn verify_token(config: &AuthConfig, token: &str) -> ApiResult<Claims> {
    let key = DecodingKey::from_secret(config.jwt_secret.expose().as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.required_spec_claims = std::collections::HashSet::from(["exp".to_string()]);

    let claims = decode::<Claims>(token, &key, &validation)
        .map_err(|e| {
            debug!(error = %e, "Token rejected");
            ApiError::invalid_token()
        })?
        .claims;

    if claims.is_expired(config.clock.as_ref()) {
        debug!(sub = %claims.sub, exp = claims.exp, "Token expired");
        return Err(ApiError::invalid_token());
    }
    Ok(claims)
}

// ============================================================================
// PASSWORDS
// ============================================================================

/// Hash a password on the blocking pool.
pub async fn hash_password(password: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ApiError::internal_error(format!("Failed to hash password: {}", e)))
    })
    .await
    .map_err(|e| ApiError::internal_error(format!("Password hashing task failed: {}", e)))?
}

/// Check a password against a stored PHC string on the blocking pool.
/// An unparseable stored hash never matches.
pub async fn verify_password(password: String, stored_hash: String) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || match PasswordHash::new(&stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!(error = %e, "Stored password hash is unreadable");
            false
        }
    })
    .await
    .map_err(|e| ApiError::internal_error(format!("Password check task failed: {}", e)))
}
