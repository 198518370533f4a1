/// Session endpoints: login, logout, current user, role catalogue
use actix_middleware::{AuthenticatedIdentity, BearerToken};
use actix_web::{web, HttpResponse};
use error_types::{ApiResponse, Result};
use validator::Validate;

use crate::middleware::RequestDirectory;
use crate::models::LoginRequest;
use crate::services::SessionService;

pub async fn login(
    sessions: web::Data<SessionService>,
    directory: RequestDirectory,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse> {
    let request = body.into_inner();
    request.validate()?;

    let response = sessions
        .login(&*directory, &request.username, &request.password)
        .await?;
    Ok(ApiResponse::ok(response, "Login successful"))
}

/// Always succeeds once the gate has let the request through.
pub async fn logout(sessions: web::Data<SessionService>, token: BearerToken) -> HttpResponse {
    sessions.logout(token.as_str()).await;
    ApiResponse::message_only("Logout successful")
}

pub async fn current_user(
    sessions: web::Data<SessionService>,
    directory: RequestDirectory,
    identity: AuthenticatedIdentity,
) -> Result<HttpResponse> {
    let profile = sessions
        .current_identity(&*directory, &identity.subject_id)
        .await?;
    Ok(ApiResponse::ok(profile, "OK"))
}

pub async fn list_roles(
    sessions: web::Data<SessionService>,
    directory: RequestDirectory,
) -> Result<HttpResponse> {
    let roles = sessions.list_roles(&*directory).await?;
    Ok(ApiResponse::ok(roles, "OK"))
}
