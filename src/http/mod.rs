//! HTTP seam between the balancer and the transport layer.
//!
//! # Responsibilities
//! - Define the opaque handler contract a balancer forwards requests to
//! - Provide the canned failure responses the balancer is allowed to emit
//!
//! # Design Decisions
//! - Handlers are trait objects returning boxed futures so a balancer can
//!   hold heterogeneous children (plain backends, nested balancers)
//! - The balancer surfaces exactly two failures outward: 503 when no
//!   server is available, 500 for anything else

pub mod handler;
pub mod response;

pub use handler::{HttpRequest, HttpResponse, RequestHandler};
