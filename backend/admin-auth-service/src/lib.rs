//! Back-office authentication and account service
//!
//! Login mints HS256 session tokens, logout revokes them, and every route
//! under `/api` passes through the shared [`actix_middleware::AuthGate`].
//! Each request gets its own [`directory::UserDirectory`] whose database
//! connection is released when the request completes.

pub mod config;
pub mod db;
pub mod directory;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod telemetry;

pub use config::Config;

#[cfg(test)]
mod tests;
