//! Logging middleware
//!
//! One structured line per request. The authenticated username is added
//! when a gate attached an identity; tokens and headers are never logged.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::time::Instant;

use crate::identity::AuthenticatedIdentity;

/// Middleware that logs HTTP requests and responses
#[derive(Clone, Default)]
pub struct Logging;

impl<S, B> Transform<S, ServiceRequest> for Logging
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = LoggingService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(LoggingService { service }))
    }
}

pub struct LoggingService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for LoggingService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start = Instant::now();
        let method = req.method().clone();
        let path = req.path().to_string();

        let fut = self.service.call(req);

        Box::pin(async move {
            let res = match fut.await {
                Ok(res) => res,
                Err(e) => {
                    tracing::error!(
                        method = %method,
                        path = %path,
                        duration_ms = start.elapsed().as_millis() as u64,
                        error = %e,
                        "HTTP request failed"
                    );
                    return Err(e);
                }
            };

            let status = res.status();
            let user = res
                .request()
                .extensions()
                .get::<AuthenticatedIdentity>()
                .map(|identity| identity.username.clone())
                .unwrap_or_else(|| "-".to_string());
            let duration_ms = start.elapsed().as_millis() as u64;

            if status.is_server_error() {
                tracing::warn!(
                    method = %method,
                    path = %path,
                    status = status.as_u16(),
                    user = %user,
                    duration_ms,
                    "HTTP request completed"
                );
            } else {
                tracing::info!(
                    method = %method,
                    path = %path,
                    status = status.as_u16(),
                    user = %user,
                    duration_ms,
                    "HTTP request completed"
                );
            }

            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App, HttpResponse};

    #[actix_web::test]
    async fn passes_responses_through() {
        let app = test::init_service(
            App::new()
                .wrap(Logging)
                .route("/ok", web::get().to(|| async { HttpResponse::Ok().body("fine") }))
                .route(
                    "/fail",
                    web::get().to(|| async { HttpResponse::InternalServerError().finish() }),
                ),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/ok").to_request()).await;
        assert_eq!(resp.status(), 200);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/fail").to_request()).await;
        assert_eq!(resp.status(), 500);
    }
}
