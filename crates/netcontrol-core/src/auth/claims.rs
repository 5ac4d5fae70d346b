//! Token claims.
//!
//! `Claims` is what the server signs. `peek_claims` reads the payload segment
//! of a token on the client without checking the signature.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::Clock;

/// Claim set carried by a netcontrol bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: impl Into<String>, lifetime_secs: i64, clock: &dyn Clock) -> Self {
        let now = clock.now_epoch_secs();
        Self {
            sub: user_id.into(),
            iat: now,
            exp: now + lifetime_secs,
        }
    }

    /// A token is only valid while `exp` is strictly in the future.
    pub fn is_expired(&self, clock: &dyn Clock) -> bool {
        self.exp <= clock.now_epoch_secs()
    }
}

/// Claims read from a token without signature verification.
///
/// Every field is optional; the advisory check only looks at `exp`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UnverifiedClaims {
    #[serde(default)]
    pub sub: Option<serde_json::Value>,
    #[serde(default)]
    pub iat: Option<f64>,
    #[serde(default)]
    pub exp: Option<f64>,
}

impl UnverifiedClaims {
    /// Tokens without an `exp` claim never look expired to the client.
    pub fn is_expired(&self, clock: &dyn Clock) -> bool {
        match self.exp {
            Some(exp) => exp <= clock.now_epoch_secs() as f64,
            None => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum ClaimsError {
    #[error("Token does not have three segments")]
    Malformed,

    #[error("Token payload is not base64url: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("Token payload is not a JSON claim set: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode the payload segment of a compact JWS without verifying it.
pub fn peek_claims(token: &str) -> Result<UnverifiedClaims, ClaimsError> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (segments.next(), segments.next(), segments.next(), segments.next())
    else {
        return Err(ClaimsError::Malformed);
    };

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;

    fn token_with_payload(json: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(json)
        )
    }

    #[test]
    fn test_claims_new_uses_clock() {
        let claims = Claims::new("user-1", 3600, &FixedClock(1_000));
        assert_eq!(claims.iat, 1_000);
        assert_eq!(claims.exp, 4_600);
        assert!(!claims.is_expired(&FixedClock(4_599)));
        assert!(claims.is_expired(&FixedClock(4_600)));
    }

    #[test]
    fn test_peek_claims_reads_exp() {
        let token = token_with_payload(r#"{"sub":"abc","iat":1000,"exp":2000}"#);
        let claims = peek_claims(&token).unwrap();
        assert_eq!(claims.exp, Some(2000.0));
        assert!(!claims.is_expired(&FixedClock(1999)));
        assert!(claims.is_expired(&FixedClock(2000)));
    }

    #[test]
    fn test_peek_claims_accepts_padded_payload() {
        let payload = base64::engine::general_purpose::URL_SAFE.encode(r#"{"exp":50}"#);
        assert!(payload.ends_with('='));
        let token = format!("h.{}.s", payload);
        assert_eq!(peek_claims(&token).unwrap().exp, Some(50.0));
    }

    #[test]
    fn test_peek_claims_without_exp_is_not_expired() {
        let token = token_with_payload(r#"{"userId":"abc"}"#);
        let claims = peek_claims(&token).unwrap();
        assert!(!claims.is_expired(&FixedClock(i64::MAX / 2)));
    }

    #[test]
    fn test_peek_claims_rejects_garbage() {
        assert!(matches!(peek_claims("nodots"), Err(ClaimsError::Malformed)));
        assert!(matches!(peek_claims("a.b.c.d"), Err(ClaimsError::Malformed)));
        assert!(matches!(peek_claims("a.!!!.c"), Err(ClaimsError::Encoding(_))));
        let not_json = format!("a.{}.c", URL_SAFE_NO_PAD.encode("hello"));
        assert!(matches!(peek_claims(&not_json), Err(ClaimsError::Json(_))));
    }
}
