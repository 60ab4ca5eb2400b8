//! Panic recovery middleware.
//!
//! A panic inside a handler is caught at this layer, logged with the panic
//! payload and returned as an internal [`ApiError`], which renders as the
//! redacted 500 envelope.
//!
//! The request is routed after this layer, and routing needs sole ownership
//! of the request; only owned copies of the method and path are kept here.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::task::{Context, Poll};

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::Error;
use futures_util::FutureExt as _;
use futures_util::future::{LocalBoxFuture, Ready, ready};
use tracing::error;

use crate::error::Error as ApiError;

/// Middleware converting handler panics into 500 responses.
///
/// # Examples
/// ```
/// use actix_web::App;
/// use servekit::middleware::Recover;
///
/// let app = App::new().wrap(Recover);
/// ```
#[derive(Clone)]
pub struct Recover;

impl<S, B> Transform<S, ServiceRequest> for Recover
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RecoverMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RecoverMiddleware { service }))
    }
}

/// Service wrapper produced by [`Recover`].
pub struct RecoverMiddleware<S> {
    service: S,
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

impl<S, B> Service<ServiceRequest> for RecoverMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let method = req.method().to_string();
        let path = req.path().to_owned();
        let fut = self.service.call(req);
        Box::pin(async move {
            match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => {
                    error!(
                        panic = panic_message(payload.as_ref()),
                        method = %method,
                        path = %path,
                        "handler panicked"
                    );
                    Err(ApiError::internal("handler panicked").into())
                }
            }
        })
    }
}
