//! Sticky-session resolver.

use super::cookie::{format_set_cookie, read_cookie};
use super::hashing::{double_weak_hash, strong_hash, weak_hash};
use crate::balancer::handle::ServerHandle;
use crate::config::schema::StickyConfig;
use crate::http::handler::{HttpRequest, HttpResponse};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderName, HeaderValue};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

/// A resolved affinity: the pinned server, and whether the incoming token
/// used a legacy encoding and should be rewritten to the canonical form.
pub struct StickyHit {
    pub server: Arc<ServerHandle>,
    pub needs_rewrite: bool,
}

struct Table {
    /// Every accepted encoding → handle.
    by_token: HashMap<String, Arc<ServerHandle>>,
    /// Server name → canonical (strong) token.
    canonical: HashMap<String, String>,
}

/// Maps session tokens carried in a cookie or header to server handles,
/// tolerating legacy token encodings.
pub struct StickyResolver {
    config: StickyConfig,
    table: RwLock<Table>,
}

impl StickyResolver {
    pub fn new(config: StickyConfig) -> Self {
        Self {
            config,
            table: RwLock::new(Table {
                by_token: HashMap::new(),
                canonical: HashMap::new(),
            }),
        }
    }

    /// Accept all encodings of a server's name: the canonical strong hash,
    /// the raw name, the legacy weak hash, and the double-hashed legacy
    /// variant.
    pub fn register(&self, server: Arc<ServerHandle>) {
        let name = server.name().to_string();
        let canonical = strong_hash(&name);
        let mut table = self.table.write().expect("sticky table lock poisoned");
        table
            .by_token
            .insert(canonical.clone(), Arc::clone(&server));
        table.by_token.insert(name.clone(), Arc::clone(&server));
        table
            .by_token
            .insert(weak_hash(&name), Arc::clone(&server));
        table.by_token.insert(double_weak_hash(&name), server);
        table.canonical.insert(name, canonical);
    }

    /// Look up the request's session token. A miss is a normal
    /// fallthrough signal, not an error.
    pub fn resolve(&self, req: &HttpRequest) -> Option<StickyHit> {
        let token = self.extract(req)?;
        let table = self.table.read().expect("sticky table lock poisoned");
        let server = table.by_token.get(&token)?;
        let canonical = table.canonical.get(server.name())?;
        Some(StickyHit {
            needs_rewrite: token != *canonical,
            server: Arc::clone(server),
        })
    }

    /// Canonical token for a server, if it is registered.
    pub fn canonical_token(&self, name: &str) -> Option<String> {
        self.table
            .read()
            .expect("sticky table lock poisoned")
            .canonical
            .get(name)
            .cloned()
    }

    /// Write the canonical token into the response, as a `Set-Cookie` or
    /// a plain header depending on configuration.
    pub fn apply_token(&self, resp: &mut HttpResponse, token: &str) {
        if let Some(cookie) = &self.config.cookie {
            let rendered = format_set_cookie(cookie, token);
            if let Ok(value) = HeaderValue::from_str(&rendered) {
                resp.headers_mut().append(SET_COOKIE, value);
            }
        } else if let Some(header) = &self.config.header {
            let Ok(name) = HeaderName::from_str(header) else {
                return;
            };
            if let Ok(value) = HeaderValue::from_str(token) {
                resp.headers_mut().insert(name, value);
            }
        }
    }

    fn extract(&self, req: &HttpRequest) -> Option<String> {
        if let Some(cookie) = &self.config.cookie {
            return read_cookie(req.headers(), &cookie.name);
        }
        if let Some(header) = &self.config.header {
            return req
                .headers()
                .get(header)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
        }
        None
    }
}
