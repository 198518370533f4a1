//! Salted SHA-256 password credentials
//!
//! A credential is `salt(16) ‖ SHA-256(salt ‖ utf8(password))(32)`, stored as
//! one standard base64 string in the user record. Credentials are replaced
//! wholesale on password change and never mutated in place.
//!
//! ## Security
//!
//! - The 16-byte salt comes from the OS random source, so equal passwords
//!   produce different blobs and precomputed tables are useless.
//! - Verification compares digests with [`constant_time_eq`], so response
//!   time does not reveal how many leading digest bytes matched.
//! - A stored blob that does not decode to exactly 48 bytes never verifies;
//!   it is not an error the caller has to handle.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{rngs::OsRng, RngCore};

use crate::hash::{constant_time_eq, sha256_concat};
use crate::CryptoError;

pub const SALT_LEN: usize = 16;
pub const DIGEST_LEN: usize = 32;
pub const CREDENTIAL_LEN: usize = SALT_LEN + DIGEST_LEN;

/// Decoded form of a stored password blob.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordCredential {
    salt: [u8; SALT_LEN],
    digest: [u8; DIGEST_LEN],
}

impl std::fmt::Debug for PasswordCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordCredential")
            .field("salt", &"[REDACTED]")
            .field("digest", &"[REDACTED]")
            .finish()
    }
}

impl PasswordCredential {
    /// Derive a new credential with a freshly generated salt.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::CryptoUnavailable`] if the OS random source
    /// cannot be read.
    pub fn generate(plaintext: &str) -> Result<Self, CryptoError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|e| CryptoError::CryptoUnavailable(e.to_string()))?;
        Ok(Self::with_salt(salt, plaintext))
    }

    pub fn with_salt(salt: [u8; SALT_LEN], plaintext: &str) -> Self {
        let digest = sha256_concat(&[&salt, plaintext.as_bytes()]);
        Self { salt, digest }
    }

    /// Parse a stored base64 blob.
    pub fn decode(stored: &str) -> Result<Self, CryptoError> {
        let raw = STANDARD
            .decode(stored.trim())
            .map_err(|_| CryptoError::MalformedCredential)?;
        if raw.len() != CREDENTIAL_LEN {
            return Err(CryptoError::MalformedCredential);
        }

        let mut salt = [0u8; SALT_LEN];
        let mut digest = [0u8; DIGEST_LEN];
        salt.copy_from_slice(&raw[..SALT_LEN]);
        digest.copy_from_slice(&raw[SALT_LEN..]);
        Ok(Self { salt, digest })
    }

    pub fn encode(&self) -> String {
        let mut raw = Vec::with_capacity(CREDENTIAL_LEN);
        raw.extend_from_slice(&self.salt);
        raw.extend_from_slice(&self.digest);
        STANDARD.encode(raw)
    }

    /// Recompute the digest with the stored salt and compare in constant time.
    pub fn matches(&self, plaintext: &str) -> bool {
        let candidate = sha256_concat(&[&self.salt, plaintext.as_bytes()]);
        constant_time_eq(&candidate, &self.digest)
    }
}

/// Hash a password into its storable base64 form.
pub fn hash_password(plaintext: &str) -> Result<String, CryptoError> {
    Ok(PasswordCredential::generate(plaintext)?.encode())
}

/// Verify a password against a stored blob.
///
/// Never fails: a blob that cannot be decoded simply does not match.
pub fn verify_password(plaintext: &str, stored: &str) -> bool {
    match PasswordCredential::decode(stored) {
        Ok(credential) => credential.matches(plaintext),
        Err(_) => {
            tracing::warn!("stored credential is malformed; treating as verification failure");
            false
        }
    }
}
