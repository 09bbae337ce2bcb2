//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use crate::strategy::StrategyKind;
use serde::{Deserialize, Serialize};

/// Configuration of one logical service's balancer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service name, used in logs.
    pub name: String,

    /// Which selection strategy the balancer runs.
    pub strategy: StrategyKind,

    /// Enable health-check propagation (status updaters).
    pub health_check: bool,

    /// Optional sticky-affinity settings.
    pub sticky: Option<StickyConfig>,

    /// Backend servers of this service.
    pub servers: Vec<ServerConfig>,
}

/// One backend server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Unique server identifier within the service.
    pub name: String,

    /// Weight for weighted strategies. Non-positive weights mean the
    /// server is never added.
    #[serde(default = "default_weight")]
    pub weight: f64,

    /// Start the server fenced: no new traffic, sticky sessions only.
    #[serde(default)]
    pub fenced: bool,
}

fn default_weight() -> f64 {
    1.0
}

/// Sticky-affinity settings: a cookie or a header carries the token.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StickyConfig {
    /// Cookie-based affinity.
    pub cookie: Option<CookieConfig>,

    /// Header-based affinity (header name).
    pub header: Option<String>,
}

/// Attributes of the affinity cookie.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CookieConfig {
    /// Cookie name.
    pub name: String,

    /// Set the `Secure` attribute.
    pub secure: bool,

    /// Set the `HttpOnly` attribute.
    pub http_only: bool,

    /// `SameSite` attribute.
    pub same_site: SameSite,

    /// `Max-Age` in seconds; omitted when `None`.
    pub max_age: Option<i64>,

    /// Cookie path.
    pub path: Option<String>,

    /// Cookie domain.
    pub domain: Option<String>,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            secure: false,
            http_only: false,
            same_site: SameSite::Default,
            max_age: None,
            path: Some("/".to_string()),
            domain: None,
        }
    }
}

/// `SameSite` cookie attribute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    /// Attribute omitted.
    #[default]
    Default,
    None,
    Lax,
    Strict,
}
