//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
///
/// Environment overrides are applied before validation.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut config: ProxyConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;
    config.apply_env_overrides();

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load `path` when given, otherwise start from defaults plus environment overrides.
pub fn load_or_default(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => {
            let mut config = ProxyConfig::default();
            config.apply_env_overrides();
            validate_config(&config).map_err(ConfigError::Validation)?;
            Ok(config)
        }
    }
}
