//! Request-scoped database connections
//!
//! Services that run in short-lived sandboxes cannot keep a pool alive
//! between requests. Instead each request owns one [`RequestConnection`]:
//! it holds only the immutable connect settings until the first query, opens
//! a single `PgConnection` on demand, and closes it in [`RequestConnection::release`].
//! Nothing here is shared across requests.

mod metrics;

use error_types::ServiceError;
use sqlx::{Connection, PgConnection};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::{debug, warn};

/// Database connection configuration
#[derive(Clone)]
pub struct DbConfig {
    /// Service name for metrics labeling
    pub service_name: String,
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Connection creation timeout (new connection to PostgreSQL)
    pub connect_timeout_secs: u64,
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("service_name", &self.service_name)
            .field("database_url", &"[REDACTED]")
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            service_name: String::from("unknown"),
            database_url: String::new(),
            connect_timeout_secs: 5,
        }
    }
}

impl DbConfig {
    pub fn new(service_name: impl Into<String>, database_url: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            database_url: database_url.into(),
            ..Self::default()
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("timed out after {0:?} connecting to the database")]
    ConnectTimeout(Duration),
    #[error("failed to connect to the database: {0}")]
    Connect(#[source] sqlx::Error),
    #[error("request connection already released")]
    Released,
}

impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        ServiceError::StoreUnavailable(err.to_string())
    }
}

enum Slot {
    Idle,
    Open(PgConnection),
    Released,
}

/// One lazily opened connection, owned by one request.
pub struct RequestConnection {
    config: Arc<DbConfig>,
    slot: Mutex<Slot>,
}

impl fmt::Debug for RequestConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestConnection")
            .field("service_name", &self.config.service_name)
            .finish_non_exhaustive()
    }
}

impl RequestConnection {
    pub fn new(config: Arc<DbConfig>) -> Self {
        Self {
            config,
            slot: Mutex::new(Slot::Idle),
        }
    }

    /// Borrow the connection, opening it on first use.
    ///
    /// The guard serialises access within the request; hold it only for the
    /// duration of one query or transaction.
    pub async fn acquire(&self) -> Result<MappedMutexGuard<'_, PgConnection>, DbError> {
        let mut slot = self.slot.lock().await;

        if matches!(*slot, Slot::Released) {
            return Err(DbError::Released);
        }
        if matches!(*slot, Slot::Idle) {
            let conn = open_connection(&self.config).await?;
            metrics::connection_opened(&self.config.service_name);
            *slot = Slot::Open(conn);
        }

        MutexGuard::try_map(slot, |slot| match slot {
            Slot::Open(conn) => Some(conn),
            _ => None,
        })
        .map_err(|_| DbError::Released)
    }

    pub async fn is_open(&self) -> bool {
        matches!(&*self.slot.lock().await, Slot::Open(_))
    }

    /// Close the connection if one was opened. Idempotent.
    ///
    /// After release, [`acquire`](Self::acquire) fails with [`DbError::Released`].
    pub async fn release(&self) {
        let previous = {
            let mut slot = self.slot.lock().await;
            std::mem::replace(&mut *slot, Slot::Released)
        };

        if let Slot::Open(conn) = previous {
            metrics::connection_closed(&self.config.service_name);
            match conn.close().await {
                Ok(()) => debug!(service = %self.config.service_name, "request connection closed"),
                Err(e) => warn!(
                    service = %self.config.service_name,
                    error = %e,
                    "request connection did not close cleanly"
                ),
            }
        }
    }
}

impl Drop for RequestConnection {
    fn drop(&mut self) {
        // Reached when the request future is dropped before release ran.
        if let Slot::Open(_) = self.slot.get_mut() {
            metrics::connection_closed(&self.config.service_name);
            debug!(
                service = %self.config.service_name,
                "request connection dropped without release; closing socket"
            );
        }
    }
}

async fn open_connection(config: &DbConfig) -> Result<PgConnection, DbError> {
    let start = Instant::now();
    let limit = config.connect_timeout();

    let result = match tokio::time::timeout(limit, PgConnection::connect(&config.database_url)).await {
        Ok(Ok(conn)) => Ok(conn),
        Ok(Err(e)) => Err(DbError::Connect(e)),
        Err(_) => Err(DbError::ConnectTimeout(limit)),
    };

    metrics::record_connect(&config.service_name, start.elapsed(), result.as_ref().err());
    if result.is_ok() {
        debug!(service = %config.service_name, "request connection opened");
    }
    result
}

/// Open a one-off connection outside any request (migrations, readiness probes).
pub async fn connect_once(config: &DbConfig) -> Result<PgConnection, DbError> {
    open_connection(config).await
}
