//! Migration list configuration

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::error::ConfigResult;
use crate::validation::Validatable;

/// The ordered list of migrations to apply.
///
/// Order is significant and preserved exactly as written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationsConfig {
    pub paths: Vec<PathBuf>,
}

impl Validatable for MigrationsConfig {
    fn validate(&self) -> ConfigResult<()> {
        let mut seen = HashSet::new();
        for path in &self.paths {
            if path.as_os_str().is_empty() {
                return Err(self.validation_error("migration paths cannot be empty"));
            }
            if !seen.insert(path) {
                return Err(self.validation_error(format!("migration path listed twice: {}", path.display())));
            }
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "migrations"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_paths_are_rejected() {
        let config = MigrationsConfig {
            paths: vec!["001-users".into(), "002-audit".into(), "001-users".into()],
        };
        assert!(config.validate().is_err());
    }
}
