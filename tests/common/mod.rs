//! Shared helpers for balancer integration tests.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::header::{COOKIE, SET_COOKIE};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use traffic_balancer::{HttpRequest, HttpResponse, RequestHandler};

/// Handler answering 200 with its own name as body.
pub fn named_handler(name: &'static str) -> Arc<dyn RequestHandler> {
    Arc::new(move |_req: HttpRequest| async move { HttpResponse::new(Body::from(name)) })
}

/// Handler that counts how many requests reached it.
pub fn counting_handler(hits: Arc<AtomicUsize>) -> Arc<dyn RequestHandler> {
    Arc::new(move |_req: HttpRequest| {
        let hits = Arc::clone(&hits);
        async move {
            hits.fetch_add(1, Ordering::SeqCst);
            HttpResponse::new(Body::empty())
        }
    })
}

/// Handler that sleeps before answering, to simulate a slow backend.
pub fn slow_handler(name: &'static str, delay: Duration) -> Arc<dyn RequestHandler> {
    Arc::new(move |_req: HttpRequest| async move {
        tokio::time::sleep(delay).await;
        HttpResponse::new(Body::from(name))
    })
}

pub fn get_request() -> HttpRequest {
    HttpRequest::new(Body::empty())
}

pub fn request_with_cookie(cookie: &str) -> HttpRequest {
    let mut req = get_request();
    req.headers_mut()
        .insert(COOKIE, cookie.parse().unwrap());
    req
}

pub fn request_with_header(name: &'static str, value: &str) -> HttpRequest {
    let mut req = get_request();
    req.headers_mut().insert(name, value.parse().unwrap());
    req
}

pub async fn body_string(resp: HttpResponse) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// First Set-Cookie header of a response, if any.
pub fn set_cookie(resp: &HttpResponse) -> Option<String> {
    resp.headers()
        .get(SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// The `name=value` pair at the front of a Set-Cookie header.
pub fn cookie_pair(resp: &HttpResponse) -> Option<String> {
    set_cookie(resp).map(|raw| {
        raw.split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_string()
    })
}
