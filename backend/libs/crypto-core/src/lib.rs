//! Cryptographic building blocks for the back-office services
//!
//! - [`password`]: salted SHA-256 credentials with constant-time verification
//! - [`jwt`]: HS256 session tokens with explicit expiry enforcement
//! - [`hash`]: digest and comparison primitives shared by both

pub mod hash;
pub mod jwt;
pub mod password;

use thiserror::Error;

pub use jwt::{parse_expires_in, SessionClaims, TokenCodec, TokenError, TokenSubject};
pub use password::{hash_password, verify_password, PasswordCredential};

#[derive(Debug, Error)]
pub enum CryptoError {
    /// The secure random source could not be read.
    #[error("cryptographic primitive unavailable: {0}")]
    CryptoUnavailable(String),
    #[error("malformed stored credential")]
    MalformedCredential,
}

/// Exercise the random source and digest once.
///
/// Call at startup: a host without a working secure RNG must not serve
/// logins, so the error is meant to abort the process.
pub fn self_check() -> Result<(), CryptoError> {
    const PROBE: &str = "startup-self-check";

    let stored = hash_password(PROBE)?;
    if !verify_password(PROBE, &stored) || verify_password("startup-self-check!", &stored) {
        return Err(CryptoError::CryptoUnavailable(
            "credential round trip produced an inconsistent result".to_string(),
        ));
    }
    Ok(())
}
