//! Login, logout and "who am I"
//!
//! The service is stateless apart from the codec and the optional revocation
//! store; the per-request [`UserDirectory`] is passed into every call.

use actix_middleware::RevocationStore;
use crypto_core::{verify_password, TokenCodec, TokenSubject};
use error_types::{Result, ServiceError};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::directory::UserDirectory;
use crate::models::{LoginResponse, Role, UserProfile};

/// Well-formed credential that no password matches. Verified against for
/// unknown usernames so both failure paths do the same work.
const DECOY_CREDENTIAL: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

#[derive(Clone)]
pub struct SessionService {
    codec: Arc<TokenCodec>,
    revocations: Option<Arc<dyn RevocationStore>>,
}

impl SessionService {
    pub fn new(codec: Arc<TokenCodec>, revocations: Option<Arc<dyn RevocationStore>>) -> Self {
        Self { codec, revocations }
    }

    /// Check credentials and mint a token carrying the user's current roles.
    ///
    /// Unknown user and wrong password are the same error.
    pub async fn login(
        &self,
        directory: &dyn UserDirectory,
        username: &str,
        password: &str,
    ) -> Result<LoginResponse> {
        let Some(user) = directory.find_by_username(username).await? else {
            verify_password(password, DECOY_CREDENTIAL);
            debug!(username, "login for unknown username");
            return Err(ServiceError::InvalidCredentials);
        };

        if !user.is_active {
            info!(user_id = %user.id, "login attempt on disabled account");
            return Err(ServiceError::AccountDisabled);
        }

        if !verify_password(password, &user.password_hash) {
            debug!(user_id = %user.id, "login with wrong password");
            return Err(ServiceError::InvalidCredentials);
        }

        let roles = directory.roles_for_user(user.id).await?;
        let profile = UserProfile::from_parts(user, roles);

        let token = self
            .codec
            .sign(&TokenSubject {
                subject_id: profile.id.to_string(),
                username: profile.username.clone(),
                roles: profile.role_names(),
            })
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        info!(user_id = %profile.id, username = %profile.username, "user logged in");
        Ok(LoginResponse { token, user: profile })
    }

    /// Revoke `token` for the rest of its lifetime.
    ///
    /// Never fails: a token that does not verify, an absent store and a store
    /// error are all logged and the caller still gets a success.
    pub async fn logout(&self, token: &str) {
        let claims = match self.codec.decode_ignoring_expiry(token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(reason = %e, "logout with unverifiable token; nothing to revoke");
                return;
            }
        };

        let Some(store) = &self.revocations else {
            warn!(subject_id = %claims.sub, "no revocation store; token stays valid until expiry");
            return;
        };

        let ttl = self.codec.revocation_ttl(&claims);
        match store.put(token, ttl).await {
            Ok(()) => info!(subject_id = %claims.sub, ttl_seconds = ttl, "token revoked"),
            Err(e) => warn!(subject_id = %claims.sub, error = %e, "failed to revoke token"),
        }
    }

    /// Re-read the caller's account and roles; token roles may be stale.
    pub async fn current_identity(
        &self,
        directory: &dyn UserDirectory,
        subject_id: &str,
    ) -> Result<UserProfile> {
        let id = Uuid::parse_str(subject_id).map_err(|_| ServiceError::InvalidToken)?;

        let user = directory
            .find_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("User"))?;

        if !user.is_active {
            return Err(ServiceError::AccountDisabled);
        }

        let roles = directory.roles_for_user(user.id).await?;
        Ok(UserProfile::from_parts(user, roles))
    }

    pub async fn list_roles(&self, directory: &dyn UserDirectory) -> Result<Vec<Role>> {
        directory.list_roles().await
    }
}
