//! User and role lookups, scoped to one request
//!
//! A [`DirectoryProvider`] is the only process-wide piece: it holds immutable
//! connect settings and hands out a fresh [`UserDirectory`] per request. The
//! directory owns that request's database connection and gives it back in
//! [`UserDirectory::release`], which the request middleware always calls.

mod postgres;

pub use postgres::{PgDirectoryProvider, PgUserDirectory};

use async_trait::async_trait;
use error_types::Result;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{NewUser, Role, UserChanges, UserRecord};

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>>;

    async fn roles_for_user(&self, user_id: Uuid) -> Result<Vec<Role>>;

    async fn list_roles(&self) -> Result<Vec<Role>>;

    /// One page of users plus the total matching `search`.
    async fn list_users(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<UserRecord>, i64)>;

    async fn username_exists(&self, username: &str) -> Result<bool>;

    async fn create_user(&self, new_user: NewUser) -> Result<UserRecord>;

    /// `None` if the user does not exist.
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<Option<UserRecord>>;

    /// `false` if the user does not exist.
    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool>;

    /// `false` if the user does not exist.
    async fn delete_user(&self, id: Uuid) -> Result<bool>;

    /// Give back any per-request resources. Idempotent.
    async fn release(&self);
}

pub trait DirectoryProvider: Send + Sync {
    fn open(&self) -> Arc<dyn UserDirectory>;
}
