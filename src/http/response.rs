//! Canned balancer failure responses.

use super::handler::HttpResponse;
use axum::body::Body;
use axum::http::StatusCode;

/// Every configured server is down or fenced. Expected operational state,
/// not an application error.
pub fn no_available_server() -> HttpResponse {
    let mut resp = HttpResponse::new(Body::from("no available server\n"));
    *resp.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
    resp
}

/// Anything that is not "no available server".
pub fn internal_error() -> HttpResponse {
    let mut resp = HttpResponse::new(Body::empty());
    *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    resp
}
