//! Traffic-distribution core for a reverse proxy.
//!
//! Given a pool of backend handlers for one logical service, this crate
//! picks which handler serves each request, keeps that decision consistent
//! for session-affine clients, tracks per-server health, and propagates
//! health changes up a tree of nested balancers.
//!
//! # Data Flow
//! ```text
//! Request
//!     → sticky resolver (cookie/header token → pinned server, if any)
//!     → selection strategy (WRR / P2C / peak-EWMA / least-time)
//!     → server handle (in-flight guard, latency capture)
//!     → wrapped handler (opaque — dialing, TLS, retries live elsewhere)
//!
//! Health:
//!     set_status(child, up/down)
//!         → status set mutation
//!         → aggregate transition? → registered updaters → parent balancer
//! ```
//!
//! A [`Balancer`] implements [`RequestHandler`] itself, so it can be added
//! as a server of a parent balancer to form a tree.

pub mod balancer;
pub mod config;
pub mod http;
pub mod observability;
pub mod sticky;
pub mod strategy;

pub use balancer::{Balancer, BalancerError, ServerHandle};
pub use config::ServiceConfig;
pub use http::handler::{HttpRequest, HttpResponse, RequestHandler};
pub use strategy::{EwmaRegistry, Strategy, StrategyKind};
