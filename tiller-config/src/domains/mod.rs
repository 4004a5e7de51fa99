//! Domain-specific configuration modules

pub mod database;
pub mod logging;
pub mod migrations;
pub mod run;
pub mod utils;

use serde::{Deserialize, Serialize};

use crate::error::ConfigResult;
use crate::validation::Validatable;

/// Main Tiller configuration combining all domains
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TillerConfig {
    pub database: database::DatabaseConfig,
    pub run: run::RunConfig,
    pub migrations: migrations::MigrationsConfig,
    pub logging: logging::LoggingConfig,
}

impl TillerConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.database.validate()?;
        self.run.validate()?;
        self.migrations.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let mut config = TillerConfig::default();
        config.run.production = true;
        config.migrations.paths = vec!["migrations/001-initial".into()];
        serde_yaml::to_string(&config).unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
