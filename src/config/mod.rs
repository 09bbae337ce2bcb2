//! Configuration subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, all errors collected)
//!     → ServiceConfig (validated, immutable)
//!     → Balancer::from_config
//! ```
//!
//! # Design Decisions
//! - Weights, sticky settings, and the health-check flag arrive here
//!   already typed; decoding anything else is someone else's job
//! - All fields default so a minimal config stays minimal
//! - Validation is a pure function returning every error, not just the
//!   first

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_service_config, parse_service_config, ConfigError};
pub use schema::{CookieConfig, SameSite, ServerConfig, ServiceConfig, StickyConfig};
