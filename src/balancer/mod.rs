//! Balancing subsystem.
//!
//! # Data Flow
//! ```text
//! dispatch(request)
//!     → sticky resolver hit? → pinned server (fencing ignored)
//!     → strategy.next_server() among healthy, non-fenced handles
//!     → none? → 503 "no available server"
//!     → forward: inflight guard → handler.call() → latency record
//!
//! set_status(child, up)
//!     → status set toggled under write lock
//!     → strategy told
//!     → aggregate flipped? → updaters invoked after lock release
//! ```
//!
//! # Design Decisions
//! - One reader/writer lock per balancer over handlers/status/fenced;
//!   strategy-internal state is locked separately
//! - Handler invocation happens outside every balancer lock
//! - In-flight accounting is finalized by an RAII guard, surviving handler
//!   panics and dropped (disconnected) request futures
//! - Fenced servers keep serving sticky sessions but never join the
//!   strategy, so they receive zero new traffic

pub mod core;
pub mod error;
pub mod handle;

pub use core::{Balancer, StatusUpdater};
pub use error::{BalancerError, BalancerResult};
pub use handle::{InflightGuard, ServerHandle};
