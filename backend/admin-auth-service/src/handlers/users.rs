/// Account management endpoints
use actix_middleware::AuthenticatedIdentity;
use actix_web::{web, HttpResponse};
use error_types::{ApiResponse, Result};
use uuid::Uuid;
use validator::Validate;

use crate::middleware::RequestDirectory;
use crate::models::{ChangePasswordRequest, CreateUserRequest, ListUsersQuery, UpdateUserRequest};
use crate::services::AccountService;

pub async fn list_users(
    accounts: web::Data<AccountService>,
    directory: RequestDirectory,
    query: web::Query<ListUsersQuery>,
) -> Result<HttpResponse> {
    query.validate()?;
    let users = accounts.list_users(&*directory, &query).await?;
    Ok(ApiResponse::ok(users, "OK"))
}

pub async fn get_user(
    accounts: web::Data<AccountService>,
    directory: RequestDirectory,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let user = accounts.get_user(&*directory, path.into_inner()).await?;
    Ok(ApiResponse::ok(user, "OK"))
}

pub async fn create_user(
    accounts: web::Data<AccountService>,
    directory: RequestDirectory,
    body: web::Json<CreateUserRequest>,
) -> Result<HttpResponse> {
    let request = body.into_inner();
    request.validate()?;

    let user = accounts.create_user(&*directory, request).await?;
    Ok(ApiResponse::created(user, "User created"))
}

pub async fn update_user(
    accounts: web::Data<AccountService>,
    directory: RequestDirectory,
    path: web::Path<Uuid>,
    body: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse> {
    let request = body.into_inner();
    request.validate()?;

    let user = accounts
        .update_user(&*directory, path.into_inner(), request)
        .await?;
    Ok(ApiResponse::ok(user, "User updated"))
}

pub async fn delete_user(
    accounts: web::Data<AccountService>,
    directory: RequestDirectory,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    accounts.delete_user(&*directory, path.into_inner()).await?;
    Ok(ApiResponse::message_only("User deleted"))
}

pub async fn change_password(
    accounts: web::Data<AccountService>,
    directory: RequestDirectory,
    identity: AuthenticatedIdentity,
    path: web::Path<Uuid>,
    body: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse> {
    let request = body.into_inner();
    request.validate()?;

    accounts
        .change_password(&*directory, &identity, path.into_inner(), &request.new_password)
        .await?;
    Ok(ApiResponse::message_only("Password changed"))
}
