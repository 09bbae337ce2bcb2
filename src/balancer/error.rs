//! Balancer error types.

use crate::http::response;
use crate::http::HttpResponse;
use thiserror::Error;

/// Errors surfaced by a balancer.
///
/// Only two conditions exist: the operational "nothing to route to" state
/// and setup-time configuration mistakes. Everything else (handler
/// failures, slow backends) is the wrapped handler's concern.
#[derive(Debug, Error)]
pub enum BalancerError {
    /// Every configured server is unhealthy or fenced.
    #[error("no available server")]
    NoAvailableServer,

    /// Status updaters require health-check support at construction.
    #[error("health check must be enabled to register status updaters")]
    HealthCheckDisabled,
}

impl BalancerError {
    /// Canned HTTP response for this error.
    pub fn to_response(&self) -> HttpResponse {
        match self {
            Self::NoAvailableServer => response::no_available_server(),
            Self::HealthCheckDisabled => response::internal_error(),
        }
    }
}

/// Result type for balancer operations.
pub type BalancerResult<T> = Result<T, BalancerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            BalancerError::NoAvailableServer.to_string(),
            "no available server"
        );
        assert_eq!(
            BalancerError::HealthCheckDisabled.to_string(),
            "health check must be enabled to register status updaters"
        );
    }
}
