//! Cookie read/write helpers for affinity tokens.

use crate::config::schema::{CookieConfig, SameSite};
use axum::http::header::{HeaderMap, COOKIE};

/// Find a cookie value by name across all `Cookie` request headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(raw) = header.to_str() else { continue };
        for pair in raw.split(';') {
            let pair = pair.trim();
            if let Some((key, value)) = pair.split_once('=') {
                if key == name {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

/// Render a `Set-Cookie` value carrying the affinity token with the
/// configured attributes.
pub fn format_set_cookie(config: &CookieConfig, value: &str) -> String {
    let mut out = format!("{}={}", config.name, value);
    if let Some(path) = &config.path {
        out.push_str("; Path=");
        out.push_str(path);
    }
    if let Some(domain) = &config.domain {
        out.push_str("; Domain=");
        out.push_str(domain);
    }
    if let Some(max_age) = config.max_age {
        out.push_str(&format!("; Max-Age={max_age}"));
    }
    if config.http_only {
        out.push_str("; HttpOnly");
    }
    if config.secure {
        out.push_str("; Secure");
    }
    match config.same_site {
        SameSite::None => out.push_str("; SameSite=None"),
        SameSite::Lax => out.push_str("; SameSite=Lax"),
        SameSite::Strict => out.push_str("; SameSite=Strict"),
        SameSite::Default => {}
    }
    out
}
