//! Authentication and role authorization middleware
//!
//! Every request walks the same small state machine:
//!
//! ```text
//! Unclassified ──prefix match──────────────────────────▶ Whitelisted ─▶ handler
//!      │
//!      ├─ no / malformed `Authorization: Bearer` ───────▶ Rejected(401)
//!      ├─ token in revocation store ────────────────────▶ Rejected(401)
//!      ├─ codec rejects (signature, expiry, malformed) ─▶ Rejected(401)
//!      ▼
//! Authenticated ─ role set required and not intersected ▶ Rejected(403)
//!      │
//!      ▼
//! Authorized ─▶ handler (identity in request extensions)
//! ```
//!
//! [`AuthGate::evaluate`] is the pure decision; the `Transform` impl only
//! moves data between the request and that decision. All codec failures
//! render the same 401 body so callers cannot tell expiry from forgery.
//!
//! Gates compose: wrap a scope with the base gate and individual routes with
//! [`AuthGate::require_roles`]. An inner gate reuses the identity the outer
//! gate attached instead of verifying the token again.

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, HttpMessage,
};
use crypto_core::TokenCodec;
use error_types::ServiceError;
use std::collections::HashSet;
use std::future::{ready, Future, Ready};
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::identity::{parse_bearer, AuthenticatedIdentity};
use crate::metrics::record_gate_decision;
use crate::token_revocation::RevocationStore;

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingToken,
    RevokedToken,
    InvalidToken,
    Forbidden,
}

impl Rejection {
    pub fn label(self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::RevokedToken => "revoked_token",
            Self::InvalidToken => "invalid_token",
            Self::Forbidden => "forbidden",
        }
    }
}

impl From<Rejection> for ServiceError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::MissingToken => ServiceError::Unauthenticated,
            Rejection::RevokedToken => ServiceError::RevokedToken,
            Rejection::InvalidToken => ServiceError::InvalidToken,
            Rejection::Forbidden => ServiceError::Forbidden,
        }
    }
}

/// Terminal state of the gate for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Whitelisted,
    Authorized(AuthenticatedIdentity),
    Rejected(Rejection),
}

impl GateDecision {
    fn label(&self) -> &'static str {
        match self {
            Self::Whitelisted => "whitelisted",
            Self::Authorized(_) => "authorized",
            Self::Rejected(r) => r.label(),
        }
    }
}

/// Authentication middleware, optionally restricted to a role set.
#[derive(Clone)]
pub struct AuthGate {
    codec: Arc<TokenCodec>,
    revocations: Option<Arc<dyn RevocationStore>>,
    whitelist: Arc<Vec<String>>,
    allowed_roles: Option<Arc<HashSet<String>>>,
}

impl AuthGate {
    /// A gate with no public paths and no role requirement.
    ///
    /// `revocations: None` is the degraded mode: tokens are still verified,
    /// logout just cannot take effect server-side.
    pub fn new(codec: Arc<TokenCodec>, revocations: Option<Arc<dyn RevocationStore>>) -> Self {
        if revocations.is_none() {
            warn!("auth gate running without a revocation store; logged-out tokens stay valid until expiry");
        }
        Self {
            codec,
            revocations,
            whitelist: Arc::new(Vec::new()),
            allowed_roles: None,
        }
    }

    /// Paths starting with any of `prefixes` skip all checks. Empty entries are ignored.
    pub fn with_whitelist<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let prefixes: Vec<String> = prefixes
            .into_iter()
            .map(Into::into)
            .filter(|p: &String| !p.is_empty())
            .collect();
        self.whitelist = Arc::new(prefixes);
        self
    }

    /// Derive a gate that additionally requires one of `roles`.
    ///
    /// The derived gate has no whitelist: a role requirement is never
    /// bypassed by a public prefix. An empty role set means "any
    /// authenticated caller".
    pub fn require_roles<I, S>(&self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let roles: HashSet<String> = roles.into_iter().map(Into::into).collect();
        Self {
            codec: self.codec.clone(),
            revocations: self.revocations.clone(),
            whitelist: Arc::new(Vec::new()),
            allowed_roles: if roles.is_empty() {
                None
            } else {
                Some(Arc::new(roles))
            },
        }
    }

    pub fn is_whitelisted(&self, path: &str) -> bool {
        self.whitelist.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Decide what happens to a request.
    ///
    /// `existing` is an identity already attached by an outer gate.
    pub async fn evaluate(
        &self,
        path: &str,
        authorization: Option<&str>,
        existing: Option<&AuthenticatedIdentity>,
    ) -> GateDecision {
        if self.is_whitelisted(path) {
            debug!(path, "whitelisted path; skipping authentication");
            return GateDecision::Whitelisted;
        }

        if let Some(identity) = existing {
            return self.authorize(identity.clone());
        }

        let Some(token) = authorization.and_then(parse_bearer) else {
            debug!(path, "missing or malformed bearer header");
            return GateDecision::Rejected(Rejection::MissingToken);
        };

        if let Some(store) = &self.revocations {
            match store.contains(token).await {
                Ok(true) => {
                    debug!(path, "token is revoked");
                    return GateDecision::Rejected(Rejection::RevokedToken);
                }
                Ok(false) => {}
                // Revocation is defense in depth; signature and expiry still gate below
                Err(e) => error!(error = %e, "revocation lookup failed; continuing without it"),
            }
        }

        let claims = match self.codec.verify(token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(path, reason = %e, "token verification failed");
                return GateDecision::Rejected(Rejection::InvalidToken);
            }
        };

        self.authorize(AuthenticatedIdentity::from(claims))
    }

    fn authorize(&self, identity: AuthenticatedIdentity) -> GateDecision {
        match &self.allowed_roles {
            Some(required) if !identity.has_any_role(required) => {
                warn!(
                    subject_id = %identity.subject_id,
                    roles = ?identity.roles,
                    "caller lacks required role"
                );
                GateDecision::Rejected(Rejection::Forbidden)
            }
            _ => GateDecision::Authorized(identity),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = AuthGateService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthGateService {
            service: Rc::new(service),
            gate: self.clone(),
        }))
    }
}

pub struct AuthGateService<S> {
    service: Rc<S>,
    gate: AuthGate,
}

impl<S, B> Service<ServiceRequest> for AuthGateService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let gate = self.gate.clone();

        Box::pin(async move {
            let path = req.path().to_string();
            let authorization = req
                .headers()
                .get(AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .map(str::to_string);
            let existing = req.extensions().get::<AuthenticatedIdentity>().cloned();

            let decision = gate
                .evaluate(&path, authorization.as_deref(), existing.as_ref())
                .await;
            // Nested gates: the outer gate already counted this request
            if existing.is_none() {
                record_gate_decision(decision.label());
            }

            match decision {
                GateDecision::Whitelisted => {
                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                }
                GateDecision::Authorized(identity) => {
                    req.extensions_mut().insert(identity);
                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                }
                GateDecision::Rejected(rejection) => {
                    let err = ServiceError::from(rejection);
                    Ok(req.error_response(err).map_into_right_body())
                }
            }
        })
    }
}
