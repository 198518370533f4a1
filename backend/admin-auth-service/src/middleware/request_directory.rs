//! Per-request directory lifecycle
//!
//! Opens a [`UserDirectory`] before the handler runs and releases it after
//! the response is produced, on success and on error alike.

use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    Error, FromRequest, HttpMessage, HttpRequest,
};
use error_types::ServiceError;
use std::future::{ready, Future, Ready};
use std::ops::Deref;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;

use crate::directory::{DirectoryProvider, UserDirectory};

/// Handle to the current request's directory.
#[derive(Clone)]
pub struct RequestDirectory(pub Arc<dyn UserDirectory>);

impl Deref for RequestDirectory {
    type Target = dyn UserDirectory;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl FromRequest for RequestDirectory {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<RequestDirectory>() {
            Some(directory) => ready(Ok(directory.clone())),
            None => ready(Err(ServiceError::Internal(
                "request directory middleware is not installed".to_string(),
            )
            .into())),
        }
    }
}

pub struct RequestDirectoryMiddleware {
    provider: Arc<dyn DirectoryProvider>,
}

impl RequestDirectoryMiddleware {
    pub fn new(provider: Arc<dyn DirectoryProvider>) -> Self {
        Self { provider }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequestDirectoryMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RequestDirectoryService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestDirectoryService {
            service: Rc::new(service),
            provider: self.provider.clone(),
        }))
    }
}

pub struct RequestDirectoryService<S> {
    service: Rc<S>,
    provider: Arc<dyn DirectoryProvider>,
}

impl<S, B> Service<ServiceRequest> for RequestDirectoryService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let directory = self.provider.open();
        req.extensions_mut()
            .insert(RequestDirectory(directory.clone()));

        Box::pin(async move {
            let result = service.call(req).await;
            directory.release().await;
            result
        })
    }
}
