//! # Actix Middleware Library
//!
//! Middleware and extractors shared by the back-office Actix services
//!
//! ## Modules
//! - `auth_gate`: per-request authentication and role authorization
//! - `identity`: the authenticated identity and bearer-token extractors
//! - `token_revocation`: revocation store trait with Redis and in-memory backends
//! - `logging`: request logging
//! - `metrics`: Prometheus metrics middleware and exposition handler

pub mod auth_gate;
pub mod identity;
pub mod logging;
pub mod metrics;
pub mod token_revocation;

pub use auth_gate::{AuthGate, GateDecision, Rejection};
pub use identity::{AuthenticatedIdentity, BearerToken};
pub use logging::Logging;
pub use metrics::MetricsMiddleware;
pub use token_revocation::{
    InMemoryRevocationStore, RedisRevocationStore, RevocationError, RevocationStore,
};
