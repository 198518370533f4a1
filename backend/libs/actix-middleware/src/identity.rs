//! Request-scoped identity
//!
//! [`AuthenticatedIdentity`] is built once from verified claims by the
//! [`AuthGate`](crate::AuthGate) and stored in request extensions. Handlers
//! take it as an extractor; it is never persisted.

use actix_web::{dev::Payload, http::header::AUTHORIZATION, FromRequest, HttpMessage, HttpRequest};
use crypto_core::SessionClaims;
use error_types::ServiceError;
use serde::Serialize;
use std::collections::HashSet;
use std::future::{ready, Ready};

/// Identity of the caller for the duration of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedIdentity {
    pub subject_id: String,
    pub username: String,
    pub roles: Vec<String>,
}

impl AuthenticatedIdentity {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// True iff the role list intersects `required`.
    pub fn has_any_role(&self, required: &HashSet<String>) -> bool {
        self.roles.iter().any(|r| required.contains(r))
    }
}

impl From<SessionClaims> for AuthenticatedIdentity {
    fn from(claims: SessionClaims) -> Self {
        Self {
            subject_id: claims.sub,
            username: claims.username,
            roles: claims.roles,
        }
    }
}

impl FromRequest for AuthenticatedIdentity {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<AuthenticatedIdentity>() {
            Some(identity) => ready(Ok(identity.clone())),
            None => ready(Err(ServiceError::Unauthenticated.into())),
        }
    }
}

/// Extract the token from an `Authorization` header value.
///
/// Only the exact `Bearer ` scheme prefix is accepted; an empty token is
/// treated as absent.
pub fn parse_bearer(header: &str) -> Option<&str> {
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Raw bearer token of the current request.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

impl BearerToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromRequest for BearerToken {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let token = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(parse_bearer)
            .map(|t| BearerToken(t.to_string()));

        ready(token.ok_or_else(|| ServiceError::Unauthenticated.into()))
    }
}
