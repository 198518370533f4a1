//! Token revocation (logout blacklist)
//!
//! A revoked token is recorded until its natural expiry and no longer. The
//! store is defense in depth: absence of an entry means "not revoked", and
//! signature and expiry are still checked independently by the gate.
//!
//! Keys never contain the raw token; they are `"{prefix}:{sha256_hex(token)}"`.

use async_trait::async_trait;
use crypto_core::hash::sha256_hex;
use dashmap::DashMap;
use error_types::ServiceError;
use redis_utils::{with_timeout, SharedConnectionManager, DEFAULT_COMMAND_TIMEOUT};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_KEY_PREFIX: &str = "revoked:token";

#[derive(Debug, Error)]
pub enum RevocationError {
    #[error("revocation store unavailable: {0}")]
    Unavailable(String),
}

impl From<RevocationError> for ServiceError {
    fn from(err: RevocationError) -> Self {
        ServiceError::StoreUnavailable(err.to_string())
    }
}

impl From<redis::RedisError> for RevocationError {
    fn from(err: redis::RedisError) -> Self {
        RevocationError::Unavailable(err.to_string())
    }
}

/// Key-value store with per-key TTL holding revoked tokens.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Mark `token` revoked for `ttl_seconds`. Idempotent.
    ///
    /// A TTL of zero means the token is already dead; implementations write
    /// nothing so that no entry outlives its token.
    async fn put(&self, token: &str, ttl_seconds: u64) -> Result<(), RevocationError>;

    async fn contains(&self, token: &str) -> Result<bool, RevocationError>;
}

pub fn revocation_key(prefix: &str, token: &str) -> String {
    format!("{}:{}", prefix, sha256_hex(token.as_bytes()))
}

/// Redis-backed store: `SET key 1 EX ttl` / `EXISTS key`.
#[derive(Clone)]
pub struct RedisRevocationStore {
    redis: SharedConnectionManager,
    key_prefix: String,
    command_timeout: Duration,
}

impl RedisRevocationStore {
    pub fn new(redis: SharedConnectionManager) -> Self {
        Self {
            redis,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}

#[async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn put(&self, token: &str, ttl_seconds: u64) -> Result<(), RevocationError> {
        if ttl_seconds == 0 {
            debug!("token already expired; skipping revocation write");
            return Ok(());
        }

        let key = revocation_key(&self.key_prefix, token);
        // ConnectionManager is a cheap handle; don't hold the lock across I/O
        let mut conn = self.redis.lock().await.clone();

        with_timeout(self.command_timeout, async {
            redis::cmd("SET")
                .arg(&key)
                .arg(1)
                .arg("EX")
                .arg(ttl_seconds)
                .query_async::<_, ()>(&mut conn)
                .await
        })
        .await?;

        debug!(ttl_seconds, "token revoked");
        Ok(())
    }

    async fn contains(&self, token: &str) -> Result<bool, RevocationError> {
        let key = revocation_key(&self.key_prefix, token);
        let mut conn = self.redis.lock().await.clone();

        let exists = with_timeout(self.command_timeout, async {
            redis::cmd("EXISTS")
                .arg(&key)
                .query_async::<_, bool>(&mut conn)
                .await
        })
        .await?;

        Ok(exists)
    }
}

/// Process-local test double; the service itself only runs against Redis or
/// in degraded mode with no store.
///
/// Entries are dropped lazily on lookup once their deadline has passed.
#[derive(Debug, Default)]
pub struct InMemoryRevocationStore {
    entries: DashMap<String, Instant>,
}

impl InMemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time left on the entry for `token`, if it is currently revoked.
    pub fn remaining_ttl(&self, token: &str) -> Option<Duration> {
        let key = revocation_key(DEFAULT_KEY_PREFIX, token);
        let deadline = self.entries.get(&key).map(|e| *e.value())?;
        deadline.checked_duration_since(Instant::now())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl RevocationStore for InMemoryRevocationStore {
    async fn put(&self, token: &str, ttl_seconds: u64) -> Result<(), RevocationError> {
        if ttl_seconds == 0 {
            return Ok(());
        }
        let key = revocation_key(DEFAULT_KEY_PREFIX, token);
        self.entries
            .insert(key, Instant::now() + Duration::from_secs(ttl_seconds));
        Ok(())
    }

    async fn contains(&self, token: &str) -> Result<bool, RevocationError> {
        let key = revocation_key(DEFAULT_KEY_PREFIX, token);
        // Copy the deadline out so the shard guard is released before remove
        let deadline = self.entries.get(&key).map(|e| *e.value());

        match deadline {
            Some(deadline) if deadline > Instant::now() => Ok(true),
            Some(_) => {
                self.entries.remove(&key);
                Ok(false)
            }
            None => Ok(false),
        }
    }
}
