//! Configuration loading from disk.

use super::schema::ServiceConfig;
use super::validation::{validate_service, ValidationError};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation failed: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate a service configuration from a TOML file.
pub fn load_service_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_service_config(&content)
}

/// Parse and validate a service configuration from a TOML string.
pub fn parse_service_config(content: &str) -> Result<ServiceConfig, ConfigError> {
    let config: ServiceConfig = toml::from_str(content)?;
    validate_service(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_config() {
        let config = parse_service_config(
            r#"
            name = "web"
            strategy = "least-time"
            [[servers]]
            name = "s1"
            weight = 2.0
            "#,
        )
        .unwrap();
        assert_eq!(config.name, "web");
    }

    #[test]
    fn test_parse_error_surfaces() {
        let err = parse_service_config("name = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_error_surfaces() {
        let err = parse_service_config(
            r#"
            name = ""
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("service name"));
    }
}
