//! Configuration loading and environment variable handling

use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use crate::domains::database::DatabaseConfig;
use crate::domains::logging::{LogFormat, LogLevel, LoggingConfig};
use crate::domains::run::RunConfig;
use crate::domains::TillerConfig;
use crate::error::{ConfigError, ConfigResult};

/// Configuration loader with environment variable support
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with the `TILLER` prefix
    pub fn new() -> Self {
        Self {
            prefix: "TILLER".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<TillerConfig> {
        let config = self.read(Some(path))?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<TillerConfig> {
        let config = self.read(None::<&Path>)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<TillerConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// File (or defaults) plus environment overrides, not yet validated.
    ///
    /// Used when command line flags still have to be layered on top.
    pub fn read(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<TillerConfig> {
        let mut config = match config_path {
            Some(path) => {
                let path = path.as_ref();
                debug!("Reading configuration from {}", path.display());
                let content = std::fs::read_to_string(path)?;
                if content.trim().is_empty() {
                    TillerConfig::default()
                } else {
                    serde_yaml::from_str(&content)?
                }
            }
            None => TillerConfig::default(),
        };

        self.apply_env_overrides(&mut config)?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut TillerConfig) -> ConfigResult<()> {
        self.apply_database_overrides(&mut config.database)?;
        self.apply_run_overrides(&mut config.run);
        self.apply_logging_overrides(&mut config.logging)?;
        Ok(())
    }

    fn apply_database_overrides(&self, config: &mut DatabaseConfig) -> ConfigResult<()> {
        if let Some(url) = self.get_env_var("DATABASE_URL") {
            // Fail here so the variable is named in the error
            url::Url::parse(&url)
                .map_err(|e| ConfigError::EnvError(format!("Invalid {}_DATABASE_URL: {}", self.prefix, e)))?;
            config.url = url;
        }

        if let Some(search_path) = self.get_env_var("SEARCH_PATH") {
            config.search_path = Some(search_path);
        }

        if let Some(schema) = self.get_env_var("BOOKKEEPING_SCHEMA") {
            config.bookkeeping_schema = schema;
        }

        Ok(())
    }

    fn apply_run_overrides(&self, config: &mut RunConfig) {
        if let Some(host) = self.get_env_var("HOST_NAME") {
            config.host_name = Some(host);
        }

        if let Some(file) = self.get_env_var("RESTORE_FILE") {
            config.restore_file = Some(file.into());
        }
    }

    fn apply_logging_overrides(&self, config: &mut LoggingConfig) -> ConfigResult<()> {
        if let Some(level) = self.get_env_var("LOG_LEVEL") {
            config.level = LogLevel::from_str(&level)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", level)))?;
        }

        if let Some(format) = self.get_env_var("LOG_FORMAT") {
            config.format = LogFormat::from_str(&format)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_FORMAT: {}", format)))?;
        }

        Ok(())
    }

    /// Get environment variable with prefix, ignoring unset and empty values
    fn get_env_var(&self, name: &str) -> Option<String> {
        std::env::var(format!("{}_{}", self.prefix, name))
            .ok()
            .filter(|value| !value.is_empty())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
