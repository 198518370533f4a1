//! Unified error types for the back-office services
//!
//! Every failure a client can observe is a [`ServiceError`]. The variant
//! decides the HTTP status (see [`ServiceError::status_code`]) and the
//! message placed in the response envelope; nothing else in the codebase
//! maps errors to statuses.
//!
//! # Design Principles
//!
//! 1. **One table**: status codes are derived here and only here
//! 2. **No oracles**: all token failures render the same 401 body
//! 3. **No leaks**: internal details are logged, never returned

use thiserror::Error;

pub mod http;

pub use http::ApiResponse;

/// Core service error type shared by the middleware and the services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Unknown username or wrong password. Deliberately indistinguishable.
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Credentials were correct but the account is switched off.
    #[error("Account is disabled")]
    AccountDisabled,

    /// No usable `Authorization: Bearer <token>` header.
    #[error("Authentication required")]
    Unauthenticated,

    /// Signature mismatch, expiry and malformed tokens all collapse here.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// Token is present in the revocation store.
    #[error("Token has been revoked")]
    RevokedToken,

    /// Authenticated, but no role in the required set.
    #[error("Insufficient permissions")]
    Forbidden,

    /// Payload failed field validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Payload could not be parsed at all.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Resource not found
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Conflict (e.g., duplicate username)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A collaborator store (revocation store, connection slot) failed.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Internal server error (catch-all)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// The single error → HTTP status table.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidCredentials
            | Self::Unauthenticated
            | Self::InvalidToken
            | Self::RevokedToken => 401,
            Self::Forbidden | Self::AccountDisabled => 403,
            Self::Validation(_) | Self::BadRequest(_) => 400,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::StoreUnavailable(_) | Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Message safe to hand to the client.
    pub fn client_message(&self) -> String {
        if self.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        }
    }

    /// Log error with appropriate level and context
    pub fn log(&self) {
        match self {
            Self::Validation(_) | Self::BadRequest(_) | Self::NotFound(_) | Self::Conflict(_) => {
                tracing::debug!(error = %self, "Client error");
            }
            Self::InvalidCredentials
            | Self::AccountDisabled
            | Self::Unauthenticated
            | Self::InvalidToken
            | Self::RevokedToken
            | Self::Forbidden => {
                tracing::info!(error = %self, "Authentication/authorization rejected");
            }
            Self::StoreUnavailable(_) | Self::Database(_) | Self::Internal(_) => {
                tracing::error!(error = %self, "Server error");
            }
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("record"),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Conflict("record already exists".to_string())
            }
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                Self::BadRequest("referenced record does not exist".to_string())
            }
            other => Self::Database(other.to_string()),
        }
    }
}

/// Result alias used across the services.
pub type Result<T> = std::result::Result<T, ServiceError>;
