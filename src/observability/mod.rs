//! Observability.
//!
//! # Responsibilities
//! - One-call logging setup for binaries and integration tests
//!
//! # Design Decisions
//! - Structured logging via `tracing`; balancer code emits events with
//!   `service` / `server` fields rather than formatted strings
//! - Level comes from `RUST_LOG`, defaulting to `info`

pub mod logging;

pub use logging::init_logging;
