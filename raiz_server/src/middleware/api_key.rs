//! API key middleware for Actix Web.
//!
//! Trusted machine clients (the external search robots) authenticate with a shared key in the `X-Api-Key` header.
//! Wrap any scope or resource that only those clients may call with [`ApiKeyMiddlewareFactory`].
//!
//! If no key has been configured, every request is refused.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use raiz_common::Secret;

use crate::{
    errors::{AuthError, ServerError},
    helpers::{constant_time_eq, get_remote_ip},
};

pub const API_KEY_HEADER: &str = "X-Api-Key";

pub struct ApiKeyMiddlewareFactory {
    key: Secret<String>,
    use_x_forwarded_for: bool,
    use_forwarded: bool,
}

impl ApiKeyMiddlewareFactory {
    pub fn new(key: Secret<String>) -> Self {
        ApiKeyMiddlewareFactory { key, use_x_forwarded_for: false, use_forwarded: false }
    }

    /// Which headers to trust when logging the address of rejected callers.
    pub fn with_forwarding(mut self, use_x_forwarded_for: bool, use_forwarded: bool) -> Self {
        self.use_x_forwarded_for = use_x_forwarded_for;
        self.use_forwarded = use_forwarded;
        self
    }
}

impl<S, B> Transform<S, ServiceRequest> for ApiKeyMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = ApiKeyMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ApiKeyMiddlewareService {
            key: self.key.clone(),
            use_x_forwarded_for: self.use_x_forwarded_for,
            use_forwarded: self.use_forwarded,
            service: Rc::new(service),
        }))
    }
}

pub struct ApiKeyMiddlewareService<S> {
    key: Secret<String>,
    use_x_forwarded_for: bool,
    use_forwarded: bool,
    service: Rc<S>,
}

impl<S> ApiKeyMiddlewareService<S> {
    fn is_authorized(&self, req: &ServiceRequest) -> bool {
        let expected = self.key.reveal().trim();
        if expected.is_empty() {
            warn!("🔐️ No internal API key is configured. Denying access.");
            return false;
        }
        req.headers()
            .get(API_KEY_HEADER)
            .map(|given| constant_time_eq(given.as_bytes(), expected.as_bytes()))
            .unwrap_or(false)
    }
}

impl<S, B> Service<ServiceRequest> for ApiKeyMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        trace!("🔐️ Checking API key for request");
        if self.is_authorized(&req) {
            trace!("🔐️ API key check for request ✅️");
            let service = Rc::clone(&self.service);
            return Box::pin(async move { service.call(req).await });
        }
        let ip = get_remote_ip(req.request(), self.use_x_forwarded_for, self.use_forwarded);
        warn!("🔐️ Invalid or missing API key in request to {} from {ip:?}. Denying access.", req.path());
        let err: Error = ServerError::AuthenticationError(AuthError::InvalidApiKey).into();
        Box::pin(async move { Err::<ServiceResponse<B>, _>(err) })
    }
}
