//! The opaque request-handler contract.

use axum::body::Body;
use axum::http::{Request, Response};
use std::future::Future;
use std::pin::Pin;

/// Request type flowing through a balancer.
pub type HttpRequest = Request<Body>;

/// Response type produced by handlers.
pub type HttpResponse = Response<Body>;

/// Boxed future returned by [`RequestHandler::call`].
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = HttpResponse> + Send + 'a>>;

/// A request-processing capability.
///
/// This is a black box to the balancer: no contract beyond "it produces a
/// response" is imposed. Manually boxed futures keep the trait
/// object-safe, so balancers can nest inside balancers.
pub trait RequestHandler: Send + Sync {
    /// Process one request.
    fn call(&self, req: HttpRequest) -> HandlerFuture<'_>;
}

impl<F, Fut> RequestHandler for F
where
    F: Fn(HttpRequest) -> Fut + Send + Sync,
    Fut: Future<Output = HttpResponse> + Send + 'static,
{
    fn call(&self, req: HttpRequest) -> HandlerFuture<'_> {
        Box::pin(self(req))
    }
}
