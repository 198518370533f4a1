//! Account administration
//!
//! Route-level role gating decides who may call most of these. The one
//! exception is [`AccountService::change_password`], which any authenticated
//! caller may reach and which applies its own self-or-super-admin rule.

use actix_middleware::AuthenticatedIdentity;
use crypto_core::hash_password;
use error_types::{Result, ServiceError};
use tracing::info;
use uuid::Uuid;

use crate::directory::UserDirectory;
use crate::models::{
    CreateUserRequest, ListUsersQuery, NewUser, Pagination, UpdateUserRequest, UserChanges, UserList,
    UserProfile, SUPER_ADMIN,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct AccountService;

impl AccountService {
    pub fn new() -> Self {
        Self
    }

    pub async fn get_user(&self, directory: &dyn UserDirectory, id: Uuid) -> Result<UserProfile> {
        let user = directory
            .find_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("User"))?;
        let roles = directory.roles_for_user(user.id).await?;
        Ok(UserProfile::from_parts(user, roles))
    }

    pub async fn list_users(&self, directory: &dyn UserDirectory, query: &ListUsersQuery) -> Result<UserList> {
        let (users, total) = directory
            .list_users(query.search(), i64::from(query.limit), query.offset())
            .await?;

        let mut data = Vec::with_capacity(users.len());
        for user in users {
            let roles = directory.roles_for_user(user.id).await?;
            data.push(UserProfile::from_parts(user, roles));
        }

        Ok(UserList {
            data,
            pagination: Pagination::new(total, query.page, query.limit),
        })
    }

    pub async fn create_user(
        &self,
        directory: &dyn UserDirectory,
        request: CreateUserRequest,
    ) -> Result<UserProfile> {
        if directory.username_exists(&request.username).await? {
            return Err(ServiceError::Conflict("username already exists".to_string()));
        }

        let password_hash = hash_credential(&request.password)?;
        let user = directory
            .create_user(NewUser {
                username: request.username,
                password_hash,
                display_name: request.display_name,
                email: request.email,
                role_ids: request.role_ids,
            })
            .await?;

        info!(user_id = %user.id, username = %user.username, "user created");
        let roles = directory.roles_for_user(user.id).await?;
        Ok(UserProfile::from_parts(user, roles))
    }

    pub async fn update_user(
        &self,
        directory: &dyn UserDirectory,
        id: Uuid,
        request: UpdateUserRequest,
    ) -> Result<UserProfile> {
        let changes = UserChanges {
            display_name: request.display_name,
            email: request.email,
            is_active: request.is_active,
            role_ids: request.role_ids,
        };

        let user = directory
            .update_user(id, changes)
            .await?
            .ok_or(ServiceError::NotFound("User"))?;

        info!(user_id = %user.id, "user updated");
        let roles = directory.roles_for_user(user.id).await?;
        Ok(UserProfile::from_parts(user, roles))
    }

    pub async fn delete_user(&self, directory: &dyn UserDirectory, id: Uuid) -> Result<()> {
        if !directory.delete_user(id).await? {
            return Err(ServiceError::NotFound("User"));
        }
        info!(user_id = %id, "user deleted");
        Ok(())
    }

    /// Replace `target`'s credential. Allowed for the account owner and for super admins.
    pub async fn change_password(
        &self,
        directory: &dyn UserDirectory,
        actor: &AuthenticatedIdentity,
        target: Uuid,
        new_password: &str,
    ) -> Result<()> {
        if !may_change_password(actor, target) {
            return Err(ServiceError::Forbidden);
        }

        let password_hash = hash_credential(new_password)?;
        if !directory.update_password(target, &password_hash).await? {
            return Err(ServiceError::NotFound("User"));
        }

        info!(user_id = %target, actor = %actor.subject_id, "password changed");
        Ok(())
    }
}

pub fn may_change_password(actor: &AuthenticatedIdentity, target: Uuid) -> bool {
    actor.has_role(SUPER_ADMIN) || actor.subject_id == target.to_string()
}

fn hash_credential(password: &str) -> Result<String> {
    hash_password(password).map_err(|e| ServiceError::Internal(e.to_string()))
}
