//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::rules::{CompileError, RuleSet};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),

    #[error(transparent)]
    Compile(#[from] CompileError),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ServerConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load the configuration and compile its rules.
pub fn load_rules(path: &Path) -> Result<(ServerConfig, RuleSet), ConfigError> {
    let config = load_config(path)?;
    let rules = RuleSet::compile(&config.rules)?;
    Ok((config, rules))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_rules() {
        let file = write_config(
            r#"
            [[rules]]
            path = "/"
            content = "Hello World!"
            "#,
        );

        let (config, rules) = load_rules(file.path()).unwrap();
        assert_eq!(config.rules.len(), 1);
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/static-response.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_parse_error() {
        let file = write_config("[[rules]\npath = ");
        assert!(matches!(load_config(file.path()).unwrap_err(), ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_error_lists_everything() {
        let file = write_config("[timeouts]\nrequest_secs = 0\n");
        let err = load_config(file.path()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation failed: timeouts.request_secs must be greater than zero, at least one rule is required"
        );
    }

    #[test]
    fn test_compile_error_surfaces() {
        let file = write_config(
            r#"
            [[rules]]
            path = "/"
            "#,
        );
        let err = load_rules(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Compile(_)));
        assert_eq!(
            err.to_string(),
            "invalid rule configuration rules[0] \"/\": content or json_data must be set"
        );
    }
}
