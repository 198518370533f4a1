use async_trait::async_trait;
use db_session::{DbConfig, RequestConnection};
use error_types::{Result, ServiceError};
use std::sync::Arc;
use uuid::Uuid;

use super::{DirectoryProvider, UserDirectory};
use crate::db;
use crate::models::{NewUser, Role, UserChanges, UserRecord};

/// Opens one [`PgUserDirectory`] per request from shared connect settings.
#[derive(Debug, Clone)]
pub struct PgDirectoryProvider {
    config: Arc<DbConfig>,
}

impl PgDirectoryProvider {
    pub fn new(config: DbConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl DirectoryProvider for PgDirectoryProvider {
    fn open(&self) -> Arc<dyn UserDirectory> {
        Arc::new(PgUserDirectory {
            conn: RequestConnection::new(self.config.clone()),
        })
    }
}

/// Directory backed by the request's own PostgreSQL connection.
#[derive(Debug)]
pub struct PgUserDirectory {
    conn: RequestConnection,
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        let mut conn = self.conn.acquire().await?;
        Ok(db::users::find_by_username(&mut conn, username).await?)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>> {
        let mut conn = self.conn.acquire().await?;
        Ok(db::users::find_by_id(&mut conn, id).await?)
    }

    async fn roles_for_user(&self, user_id: Uuid) -> Result<Vec<Role>> {
        let mut conn = self.conn.acquire().await?;
        Ok(db::roles::roles_for_user(&mut conn, user_id).await?)
    }

    async fn list_roles(&self) -> Result<Vec<Role>> {
        let mut conn = self.conn.acquire().await?;
        Ok(db::roles::list_roles(&mut conn).await?)
    }

    async fn list_users(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<UserRecord>, i64)> {
        let mut conn = self.conn.acquire().await?;
        let users = db::users::list_users(&mut conn, search, limit, offset).await?;
        let total = db::users::count_users(&mut conn, search).await?;
        Ok((users, total))
    }

    async fn username_exists(&self, username: &str) -> Result<bool> {
        let mut conn = self.conn.acquire().await?;
        Ok(db::users::username_exists(&mut conn, username).await?)
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserRecord> {
        let mut conn = self.conn.acquire().await?;
        db::users::create_user(&mut conn, &new_user)
            .await
            .map_err(|e| match ServiceError::from(e) {
                ServiceError::Conflict(_) => {
                    ServiceError::Conflict("username or email already exists".to_string())
                }
                other => other,
            })
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<Option<UserRecord>> {
        let mut conn = self.conn.acquire().await?;
        db::users::update_user(&mut conn, id, &changes)
            .await
            .map_err(|e| match ServiceError::from(e) {
                ServiceError::Conflict(_) => ServiceError::Conflict("email already exists".to_string()),
                other => other,
            })
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool> {
        let mut conn = self.conn.acquire().await?;
        Ok(db::users::update_password(&mut conn, id, password_hash).await?)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool> {
        let mut conn = self.conn.acquire().await?;
        Ok(db::users::delete_user(&mut conn, id).await?)
    }

    async fn release(&self) {
        self.conn.release().await;
    }
}
