use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::user::UserProfile;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 3, max = 50, message = "username must be 3-50 characters"))]
    pub username: String,
    #[validate(length(min = 6, max = 100, message = "password must be 6-100 characters"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 50, message = "username must be 3-50 characters"))]
    pub username: String,
    #[validate(length(min = 6, max = 100, message = "password must be 6-100 characters"))]
    pub password: String,
    #[validate(length(max = 100, message = "displayName must be at most 100 characters"))]
    pub display_name: Option<String>,
    #[validate(email(message = "email is not a valid address"))]
    pub email: Option<String>,
    #[serde(default)]
    pub role_ids: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(max = 100, message = "displayName must be at most 100 characters"))]
    pub display_name: Option<String>,
    #[validate(email(message = "email is not a valid address"))]
    pub email: Option<String>,
    pub is_active: Option<bool>,
    pub role_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 6, max = 100, message = "newPassword must be 6-100 characters"))]
    pub new_password: String,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    10
}

/// Query string of `GET /api/users`.
#[derive(Debug, Deserialize, Validate)]
pub struct ListUsersQuery {
    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "page starts at 1"))]
    pub page: u32,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100, message = "limit must be 1-100"))]
    pub limit: u32,
    /// Exact username match
    pub search: Option<String>,
}

impl ListUsersQuery {
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.limit)
    }

    /// Blank search strings are treated as absent.
    pub fn search(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: i64,
    pub current_page: u32,
    pub total_pages: i64,
    pub limit: u32,
}

impl Pagination {
    pub fn new(total: i64, page: u32, limit: u32) -> Self {
        let limit_i = i64::from(limit.max(1));
        Self {
            total,
            current_page: page,
            total_pages: (total + limit_i - 1) / limit_i,
            limit,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserList {
    pub data: Vec<UserProfile>,
    pub pagination: Pagination,
}
