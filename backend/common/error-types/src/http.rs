//! HTTP error response handling
//!
//! Success and error bodies share one envelope:
//! `{"code": <status>, "message": <text>, "data": <payload|null>}`.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};

use crate::ServiceError;

/// Standard response envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// HTTP status code, repeated in the body
    pub code: u16,
    /// Human-readable message
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self {
            code: 200,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Render as a `200 OK` JSON response.
    pub fn ok(data: T, message: impl Into<String>) -> HttpResponse {
        HttpResponse::Ok().json(Self::success(data, message))
    }

    /// Render as a `201 Created` JSON response.
    pub fn created(data: T, message: impl Into<String>) -> HttpResponse {
        HttpResponse::Created().json(Self {
            code: 201,
            message: message.into(),
            data: Some(data),
        })
    }
}

impl ApiResponse<()> {
    pub fn message_only(message: impl Into<String>) -> HttpResponse {
        HttpResponse::Ok().json(ApiResponse::<()> {
            code: 200,
            message: message.into(),
            data: None,
        })
    }

    pub fn from_error(err: &ServiceError) -> Self {
        Self {
            code: err.status_code(),
            message: err.client_message(),
            data: None,
        }
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(ServiceError::status_code(self))
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        self.log();
        HttpResponse::build(ResponseError::status_code(self)).json(ApiResponse::from_error(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn error_response_uses_envelope() {
        let resp = ServiceError::InvalidToken.error_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], 401);
        assert_eq!(json["message"], "Invalid or expired token");
        assert!(json["data"].is_null());
    }

    #[actix_web::test]
    async fn internal_error_body_is_generic() {
        let resp = ServiceError::Internal("pool exploded".into()).error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "Internal server error");
    }
}
