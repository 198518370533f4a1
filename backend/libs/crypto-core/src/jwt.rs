//! Session token codec for the back-office services
//!
//! Tokens are compact JWS: three base64url segments `header.payload.signature`,
//! header `alg=HS256`, payload [`SessionClaims`], signature HMAC-SHA256 over
//! `header.payload` with the shared secret.
//!
//! ## Security Design
//!
//! - **HS256 only**: the validation accepts exactly one algorithm, so a
//!   token whose header names anything else is rejected before any claim is read
//! - **Expiry enforced here**: `now >= exp` is checked by this module, not
//!   delegated to library leeway, so a verified-but-expired token never passes
//! - **No global keys**: a [`TokenCodec`] owns its keys; services build one
//!   at startup from configuration and share it behind an `Arc`
//!
//! ## Usage
//!
//! ```rust
//! use crypto_core::jwt::{TokenCodec, TokenSubject};
//!
//! let codec = TokenCodec::new(b"a-long-random-secret-from-the-environment", 3600);
//! let subject = TokenSubject {
//!     subject_id: "9b2c…".to_string(),
//!     username: "alice".to_string(),
//!     roles: vec!["admin".to_string()],
//! };
//!
//! let token = codec.sign(&subject).unwrap();
//! let claims = codec.verify(&token).unwrap();
//! assert_eq!(claims.username, "alice");
//! ```

use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Constants
// ============================================================================

/// Lifetime used when `JWT_EXPIRES_IN` is missing or unparseable.
pub const DEFAULT_TTL_SECONDS: i64 = 24 * 60 * 60;

const JWT_ALGORITHM: Algorithm = Algorithm::HS256;

static EXPIRES_IN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)([smhd])$").expect("static regex is valid"));

// ============================================================================
// Data Structures
// ============================================================================

/// Identity fields the caller supplies when minting a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    pub subject_id: String,
    pub username: String,
    pub roles: Vec<String>,
}

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    pub username: String,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl SessionClaims {
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.exp
    }

    /// Whole seconds left before expiry as seen from `now_millis`, rounded
    /// down so the result never reaches past `exp`.
    pub fn remaining_lifetime(&self, now_millis: i64) -> u64 {
        let left = self.exp.saturating_mul(1000).saturating_sub(now_millis);
        u64::try_from(left / 1000).unwrap_or(0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token is malformed")]
    Malformed,
    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => Self::InvalidSignature,
            ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Malformed,
        }
    }
}

// ============================================================================
// Codec
// ============================================================================

/// Signs and verifies session tokens with one shared secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_seconds: i64,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &JWT_ALGORITHM)
            .field("keys", &"[REDACTED]")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

impl TokenCodec {
    pub fn new(secret: &[u8], ttl_seconds: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl_seconds,
        }
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Mint a token with the configured lifetime.
    pub fn sign(&self, subject: &TokenSubject) -> Result<String, TokenError> {
        self.sign_with_ttl(subject, self.ttl_seconds)
    }

    pub fn sign_with_ttl(&self, subject: &TokenSubject, ttl_seconds: i64) -> Result<String, TokenError> {
        self.sign_at(subject, Utc::now().timestamp(), ttl_seconds)
    }

    /// Mint a token as if the clock read `now`.
    pub fn sign_at(
        &self,
        subject: &TokenSubject,
        now: i64,
        ttl_seconds: i64,
    ) -> Result<String, TokenError> {
        let claims = SessionClaims {
            sub: subject.subject_id.clone(),
            username: subject.username.clone(),
            roles: subject.roles.clone(),
            iat: now,
            exp: now.saturating_add(ttl_seconds),
        };

        encode(&Header::new(JWT_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify signature and expiry against the current clock.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, TokenError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    pub fn verify_at(&self, token: &str, now: i64) -> Result<SessionClaims, TokenError> {
        let claims = self.decode_signed(token)?;
        if claims.is_expired_at(now) {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    /// How long a revocation entry for `claims` may live, read from the same
    /// clock as [`TokenCodec::verify`].
    pub fn revocation_ttl(&self, claims: &SessionClaims) -> u64 {
        claims.remaining_lifetime(Utc::now().timestamp_millis())
    }

    /// Verify the signature but accept an expired token.
    ///
    /// Only for computing how long a revocation entry has to live; never use
    /// the result to authenticate a request.
    pub fn decode_ignoring_expiry(&self, token: &str) -> Result<SessionClaims, TokenError> {
        self.decode_signed(token)
    }

    fn decode_signed(&self, token: &str) -> Result<SessionClaims, TokenError> {
        if token.split('.').count() != 3 {
            return Err(TokenError::Malformed);
        }

        let mut validation = Validation::new(JWT_ALGORITHM);
        validation.validate_exp = false;
        validation.leeway = 0;

        let data = decode::<SessionClaims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }
}

// ============================================================================
// TTL parsing
// ============================================================================

/// Parse a `<integer><unit>` duration (`s`, `m`, `h`, `d`) into seconds.
///
/// Anything else, including an empty string or an overflowing value, yields
/// [`DEFAULT_TTL_SECONDS`] (24h). The fallback is silent by contract; callers
/// that want to warn can compare against [`try_parse_expires_in`].
pub fn parse_expires_in(raw: &str) -> i64 {
    try_parse_expires_in(raw).unwrap_or(DEFAULT_TTL_SECONDS)
}

pub fn try_parse_expires_in(raw: &str) -> Option<i64> {
    let caps = EXPIRES_IN_PATTERN.captures(raw.trim())?;
    let amount: i64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = match caps.get(2)?.as_str() {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => return None,
    };
    amount.checked_mul(unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"unit-test-secret-with-enough-entropy";

    fn subject() -> TokenSubject {
        TokenSubject {
            subject_id: "6f1d2c1e-8d7a-4a55-9a0e-1f4d8f2b9c11".to_string(),
            username: "alice".to_string(),
            roles: vec!["admin".to_string(), "operator".to_string()],
        }
    }

    #[test]
    fn test_sign_and_verify() {
        let codec = TokenCodec::new(SECRET, 3600);
        let token = codec.sign(&subject()).unwrap();

        assert_eq!(token.split('.').count(), 3);

        let claims = codec.verify(&token).unwrap();
        assert_eq!(claims.sub, subject().subject_id);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.roles, vec!["admin", "operator"]);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_expiry_boundary() {
        let codec = TokenCodec::new(SECRET, 60);
        let token = codec.sign_at(&subject(), 1_000, 60).unwrap();

        assert!(codec.verify_at(&token, 1_059).is_ok());
        assert_eq!(codec.verify_at(&token, 1_060), Err(TokenError::Expired));
        assert_eq!(codec.verify_at(&token, 5_000), Err(TokenError::Expired));
    }

    #[test]
    fn test_negative_ttl_is_expired() {
        let codec = TokenCodec::new(SECRET, 3600);
        let token = codec.sign_with_ttl(&subject(), -1).unwrap();

        assert_eq!(codec.verify(&token), Err(TokenError::Expired));
        // Signature is still good
        assert!(codec.decode_ignoring_expiry(&token).is_ok());
    }

    #[test]
    fn test_wrong_secret() {
        let signer = TokenCodec::new(SECRET, 3600);
        let other = TokenCodec::new(b"a-completely-different-secret", 3600);
        let token = signer.sign(&subject()).unwrap();

        assert_eq!(other.verify(&token), Err(TokenError::InvalidSignature));
        assert_eq!(
            other.decode_ignoring_expiry(&token),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_malformed_tokens() {
        let codec = TokenCodec::new(SECRET, 3600);
        for token in ["", "abc", "a.b", "a.b.c.d", "not.a.jwt", "!!!.???.***"] {
            assert_eq!(codec.verify(token), Err(TokenError::Malformed), "{token}");
        }
    }

    #[test]
    fn test_tampered_payload() {
        let codec = TokenCodec::new(SECRET, 3600);
        let token = codec.sign(&subject()).unwrap();
        let other = codec
            .sign(&TokenSubject {
                username: "mallory".to_string(),
                ..subject()
            })
            .unwrap();

        let parts: Vec<&str> = token.split('.').collect();
        let forged_payload = other.split('.').nth(1).unwrap();
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert_eq!(codec.verify(&forged), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_remaining_lifetime() {
        let claims = SessionClaims {
            sub: "x".into(),
            username: "x".into(),
            roles: vec![],
            iat: 100,
            exp: 160,
        };
        assert_eq!(claims.remaining_lifetime(100_000), 60);
        assert_eq!(claims.remaining_lifetime(159_000), 1);
        assert_eq!(claims.remaining_lifetime(160_000), 0);
        assert_eq!(claims.remaining_lifetime(10_000_000), 0);
    }

    #[test]
    fn test_remaining_lifetime_never_outlives_token() {
        let claims = SessionClaims {
            sub: "x".into(),
            username: "x".into(),
            roles: vec![],
            iat: 100,
            exp: 160,
        };
        // 59.001s left rounds down, so the entry expires before the token does
        assert_eq!(claims.remaining_lifetime(100_999), 59);
        assert_eq!(claims.remaining_lifetime(159_999), 0);
    }

    #[test]
    fn test_revocation_ttl_bounded_by_token_lifetime() {
        let codec = TokenCodec::new(SECRET, 3600);
        let token = codec.sign(&subject()).unwrap();
        let claims = codec.verify(&token).unwrap();

        let ttl = codec.revocation_ttl(&claims);
        assert!(ttl <= 3600);
        assert!(ttl >= 3590);

        let expired = codec.sign_with_ttl(&subject(), -1).unwrap();
        let claims = codec.decode_ignoring_expiry(&expired).unwrap();
        assert_eq!(codec.revocation_ttl(&claims), 0);
    }

    #[test]
    fn test_parse_expires_in() {
        assert_eq!(parse_expires_in("30s"), 30);
        assert_eq!(parse_expires_in("15m"), 900);
        assert_eq!(parse_expires_in("24h"), 86_400);
        assert_eq!(parse_expires_in("7d"), 604_800);
        assert_eq!(parse_expires_in(" 2h "), 7_200);
    }

    #[test]
    fn test_parse_expires_in_fallback() {
        for raw in ["", "24", "h", "1w", "-5m", "1.5h", "24H", "abc", "99999999999999999999d"] {
            assert_eq!(parse_expires_in(raw), DEFAULT_TTL_SECONDS, "{raw}");
            assert_eq!(try_parse_expires_in(raw), None, "{raw}");
        }
    }
}
