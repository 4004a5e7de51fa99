//! The `config` subcommands

use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::Path;
use tiller_config::{ConfigLoader, TillerConfig};
use tracing::info;

/// Handle configuration validation
pub fn handle_config_validate(config_file: &Path) -> Result<()> {
    info!("Validating configuration file: {}", config_file.display());

    if !config_file.exists() {
        return Err(anyhow::anyhow!(
            "Configuration file not found: {}",
            config_file.display()
        ));
    }

    match ConfigLoader::new().from_file(config_file) {
        Ok(config) => {
            println!("{} Configuration file is valid", "✓".green());
            println!("  {} migration(s) configured", config.migrations.paths.len());
            Ok(())
        }
        Err(e) => {
            println!("{} Configuration validation failed: {}", "✗".red(), e);
            Err(e.into())
        }
    }
}

/// Handle configuration generation
pub fn handle_config_generate(output: &Path, force: bool) -> Result<()> {
    info!("Generating configuration at: {}", output.display());

    if output.exists() && !force {
        return Err(anyhow::anyhow!(
            "Output file already exists: {}. Use --force to overwrite.",
            output.display()
        ));
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context("Failed to create output directory")?;
    }

    fs::write(output, TillerConfig::generate_sample()).context("Failed to write configuration file")?;

    println!("{} Configuration generated at: {}", "✓".green(), output.display());
    println!("  Validate with: tiller config validate --config-file {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generate_then_validate() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("nested").join("tiller.yaml");

        handle_config_generate(&output, false).unwrap();
        handle_config_validate(&output).unwrap();

        assert!(handle_config_generate(&output, false).is_err());
        assert!(handle_config_generate(&output, true).is_ok());
    }

    #[test]
    fn test_validate_reports_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(handle_config_validate(&dir.path().join("absent.yaml")).is_err());
    }
}
