//! Database configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, validate_url, Validatable};

/// URL schemes accepted for the target database
pub const SUPPORTED_SCHEMES: &[&str] = &["postgres", "postgresql"];

/// Target database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL of the database being migrated
    pub url: String,

    /// Database connected to while the target is dropped and recreated
    pub maintenance_database: String,

    #[serde(with = "crate::domains::utils::serde_duration")]
    pub connect_timeout: Duration,

    /// Comma separated `search_path` applied to every session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_path: Option<String>,

    /// Leave the server's `search_path` alone instead of forcing `public`
    pub keep_default_search_path: bool,

    /// Schema holding the bookkeeping tables
    pub bookkeeping_schema: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost:5432/postgres".to_string(),
            maintenance_database: "postgres".to_string(),
            connect_timeout: Duration::from_secs(30),
            search_path: None,
            keep_default_search_path: false,
            bookkeeping_schema: "tiller".to_string(),
        }
    }
}

impl Validatable for DatabaseConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_url(&self.url, SUPPORTED_SCHEMES, "url", self.domain_name())?;
        validate_required_string(&self.maintenance_database, "maintenance_database", self.domain_name())?;
        validate_required_string(&self.bookkeeping_schema, "bookkeeping_schema", self.domain_name())?;
        validate_positive(self.connect_timeout.as_secs(), "connect_timeout", self.domain_name())?;

        if let Some(path) = &self.search_path {
            if path.split(',').all(|s| s.trim().is_empty()) {
                return Err(self.validation_error("search_path must name at least one schema"));
            }
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "database"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_database_config_is_valid() {
        assert!(DatabaseConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_postgres_url() {
        let config = DatabaseConfig {
            url: "sqlite://tiller.db".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_blank_bookkeeping_schema_and_search_path() {
        let config = DatabaseConfig {
            bookkeeping_schema: "  ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DatabaseConfig {
            search_path: Some(" , ".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
