/// HTTP handlers
///
/// Handlers only move data between the request and the services; every
/// failure is a `ServiceError` and is rendered by its `ResponseError` impl.
pub mod auth;
pub mod health;
pub mod users;

pub use auth::{current_user, list_roles, login, logout};
pub use health::health;
pub use users::{change_password, create_user, delete_user, get_user, list_users, update_user};
