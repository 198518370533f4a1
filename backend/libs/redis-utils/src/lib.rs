//! Redis bootstrap shared by the services
//!
//! A single [`ConnectionManager`] per process, cloned behind a Tokio mutex.
//! The manager reconnects on its own; callers bound each command with
//! [`with_timeout`] so a stalled Redis never stalls a request.

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::{Client, IntoConnectionInfo, RedisError};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration};
use tracing::info;

/// Shared Redis connection manager guarded by a Tokio mutex.
pub type SharedConnectionManager = Arc<Mutex<ConnectionManager>>;

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(500);

/// Redis connection handle for one process.
pub struct RedisPool {
    manager: SharedConnectionManager,
}

impl RedisPool {
    /// Connect, failing if the first connection cannot be made within `connect_timeout`.
    pub async fn connect(redis_url: &str, connect_timeout: Duration) -> Result<Self> {
        let info = redis_url
            .into_connection_info()
            .context("failed to parse REDIS_URL connection string")?;
        let addr_label = info.addr.to_string();

        let client = Client::open(info).context("failed to construct Redis client")?;
        let connection_manager = timeout(connect_timeout, ConnectionManager::new(client))
            .await
            .context("timed out connecting to Redis")?
            .context("failed to initialize Redis connection manager")?;

        info!(addr = %addr_label, "Redis connection manager ready");

        Ok(Self {
            manager: Arc::new(Mutex::new(connection_manager)),
        })
    }

    pub fn manager(&self) -> SharedConnectionManager {
        self.manager.clone()
    }
}

/// Run a Redis future with a deadline, mapping the timeout to an I/O error.
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, RedisError>
where
    F: Future<Output = Result<T, RedisError>>,
{
    match timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(RedisError::from((
            redis::ErrorKind::IoError,
            "redis command timed out",
        ))),
    }
}
