//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Duplicate server names, conflicting sticky modes
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Non-positive weights are logged but not rejected: the add path
//!   ignores such servers by contract

use super::schema::ServiceConfig;
use std::collections::HashSet;
use thiserror::Error;

/// One semantic problem in a service configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("service name must not be empty")]
    EmptyServiceName,

    #[error("duplicate server name '{0}'")]
    DuplicateServerName(String),

    #[error("sticky config names both a cookie and a header")]
    ConflictingStickyModes,

    #[error("sticky cookie name must not be empty")]
    EmptyCookieName,
}

/// Check a service config, collecting every error.
pub fn validate_service(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.name.is_empty() {
        errors.push(ValidationError::EmptyServiceName);
    }

    let mut seen = HashSet::new();
    for server in &config.servers {
        if !seen.insert(server.name.as_str()) {
            errors.push(ValidationError::DuplicateServerName(server.name.clone()));
        }
        if server.weight <= 0.0 {
            tracing::warn!(
                service = %config.name,
                server = %server.name,
                weight = server.weight,
                "non-positive weight, server will never be added"
            );
        }
    }

    if let Some(sticky) = &config.sticky {
        if sticky.cookie.is_some() && sticky.header.is_some() {
            errors.push(ValidationError::ConflictingStickyModes);
        }
        if let Some(cookie) = &sticky.cookie {
            if cookie.name.is_empty() {
                errors.push(ValidationError::EmptyCookieName);
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
