//! Cross-origin middleware for Actix Web.
//!
//! Only the configured frontend origins may call the API from a browser. Preflight requests from an allowed origin are
//! answered directly; every other response to an allowed origin carries the `Access-Control-Allow-*` headers.
//! Requests from other origins are passed through untouched, so the browser blocks them.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::{
        header::{self, HeaderValue},
        Method,
    },
    Error,
    HttpResponse,
};
use futures::future::LocalBoxFuture;
use log::{debug, trace};

const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str = "Authorization, Content-Type, Accept";
const PREFLIGHT_MAX_AGE: &str = "3600";

pub struct CorsMiddlewareFactory {
    origins: Rc<Vec<String>>,
}

impl CorsMiddlewareFactory {
    pub fn new(origins: &[String]) -> Self {
        let origins = origins.iter().map(|o| o.trim_end_matches('/').to_string()).collect();
        CorsMiddlewareFactory { origins: Rc::new(origins) }
    }
}

impl<S, B> Transform<S, ServiceRequest> for CorsMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<EitherBody<B>>;
    type Transform = CorsMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CorsMiddlewareService { origins: Rc::clone(&self.origins), service: Rc::new(service) }))
    }
}

pub struct CorsMiddlewareService<S> {
    origins: Rc<Vec<String>>,
    service: Rc<S>,
}

impl<S> CorsMiddlewareService<S> {
    /// The request's `Origin` header, if it is one of the allowed origins.
    fn allowed_origin(&self, req: &ServiceRequest) -> Option<HeaderValue> {
        let origin = req.headers().get(header::ORIGIN)?;
        let value = origin.to_str().ok()?;
        self.origins.iter().any(|o| o == value).then(|| origin.clone())
    }
}

fn is_preflight(req: &ServiceRequest) -> bool {
    req.method() == Method::OPTIONS && req.headers().contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
}

impl<S, B> Service<ServiceRequest> for CorsMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<EitherBody<B>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let Some(origin) = self.allowed_origin(&req) else {
            trace!("💻️ No allowed origin on request to {}", req.path());
            let service = Rc::clone(&self.service);
            return Box::pin(async move { service.call(req).await.map(ServiceResponse::map_into_left_body) });
        };
        if is_preflight(&req) {
            debug!("💻️ Answering CORS preflight for {} from {origin:?}", req.path());
            let response = HttpResponse::NoContent()
                .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, origin))
                .insert_header((header::ACCESS_CONTROL_ALLOW_METHODS, ALLOWED_METHODS))
                .insert_header((header::ACCESS_CONTROL_ALLOW_HEADERS, ALLOWED_HEADERS))
                .insert_header((header::ACCESS_CONTROL_ALLOW_CREDENTIALS, "true"))
                .insert_header((header::ACCESS_CONTROL_MAX_AGE, PREFLIGHT_MAX_AGE))
                .insert_header((header::VARY, "Origin"))
                .finish();
            let res = req.into_response(response).map_into_right_body();
            return Box::pin(async move { Ok(res) });
        }
        let service = Rc::clone(&self.service);
        Box::pin(async move {
            let mut res = service.call(req).await?;
            let headers = res.headers_mut();
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
            headers.insert(header::ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
            headers.insert(header::VARY, HeaderValue::from_static("Origin"));
            Ok(res.map_into_left_body())
        })
    }
}
