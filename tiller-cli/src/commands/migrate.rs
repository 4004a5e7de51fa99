//! The `migrate` command

use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use tiller_config::{ConfigError, ConfigLoader, LogLevel, TillerConfig};
use tiller_core::{DryRunMode, RunOptions};
use tiller_execution::{ExecutionError, ExecutionResult, HookOutcome, MigrationEngine, RunSummary, SqlDirectoryLoader};
use tiller_interfaces::RestoreOutcome;
use tiller_storage::{LegacyPolicy, PgRestore, PgSessionProvider, PgSettings, SearchPath, SqlRoleManager, SqlStateStore};
use tracing::{info, warn};

use crate::cli::MigrateArgs;

fn config_error(err: ConfigError) -> ExecutionError {
    ExecutionError::Configuration(err.to_string())
}

/// Layer command line flags over file and environment configuration
pub fn apply_overrides(config: &mut TillerConfig, args: &MigrateArgs, log_level: Option<&str>) -> ExecutionResult<()> {
    if args.dev {
        config.run.dev = true;
        config.run.production = false;
    }
    if args.production {
        config.run.production = true;
        config.run.dev = false;
    }
    config.run.teardown |= args.teardown;
    if args.dry {
        config.run.dry = true;
        config.run.dry_complete = false;
    }
    if args.dry_complete {
        config.run.dry_complete = true;
        config.run.dry = false;
    }

    if let Some(file) = &args.restore {
        config.run.restore_file = Some(file.clone());
    }
    config.run.schema_only |= args.schema_only;
    config.run.data_only |= args.data_only;
    if let Some(host) = &args.host_name {
        config.run.host_name = Some(host.clone());
    }

    if let Some(url) = &args.database_url {
        config.database.url = url.clone();
    }
    if let Some(search_path) = &args.search_path {
        config.database.search_path = Some(search_path.clone());
    }
    config.database.keep_default_search_path |= args.keep_default_search_path;

    if !args.migrations.is_empty() {
        config.migrations.paths = args.migrations.clone();
    }

    if let Some(level) = log_level {
        config.logging.level = level
            .parse::<LogLevel>()
            .map_err(ExecutionError::Configuration)?;
    }

    Ok(())
}

/// Host name of this machine, used when none is configured
pub fn detect_host_name() -> String {
    match hostname::get() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(e) => {
            warn!("Could not determine host name: {}", e);
            String::new()
        }
    }
}

/// Resolve configuration and options for a run. Nothing touches the database here.
pub fn prepare(
    config_path: Option<&Path>,
    log_level: Option<&str>,
    args: &MigrateArgs,
) -> ExecutionResult<(TillerConfig, RunOptions)> {
    let mut config = ConfigLoader::new().read(config_path).map_err(config_error)?;
    apply_overrides(&mut config, args, log_level)?;
    config.validate_all().map_err(config_error)?;

    let options = config.run.to_options(&detect_host_name()).map_err(config_error)?;
    Ok((config, options))
}

pub async fn handle_migrate(config_path: Option<&Path>, log_level: Option<&str>, args: MigrateArgs) -> ExecutionResult<()> {
    let (config, options) = prepare(config_path, log_level, &args)?;

    if let Err(e) = tiller_logging::init_logging_from_config(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    if config.migrations.paths.is_empty() {
        warn!("No migrations configured; only bookkeeping setup will run");
    }

    let settings = PgSettings {
        url: config.database.url.clone(),
        maintenance_database: config.database.maintenance_database.clone(),
        connect_timeout: config.database.connect_timeout,
        search_path: SearchPath::resolve(
            config.database.search_path.as_deref(),
            config.database.keep_default_search_path,
        ),
    };
    let sessions = PgSessionProvider::new(settings)?;
    let store = SqlStateStore::new(
        config.database.bookkeeping_schema.clone(),
        LegacyPolicy::new(options.legacy_cutover, options.host_name.clone()),
    );

    let engine = MigrationEngine::new(
        Arc::new(sessions),
        Arc::new(store),
        Arc::new(SqlRoleManager::new()),
        Arc::new(PgRestore::default()),
        Arc::new(SqlDirectoryLoader::new()),
    );

    info!("Migrating {} as host '{}'", config.database.url, options.host_name);
    let summary = engine.run(&options, &config.migrations.paths).await?;
    print_summary(&summary, &options);
    Ok(())
}

fn print_summary(summary: &RunSummary, options: &RunOptions) {
    let heading = match options.dry_run {
        DryRunMode::Off => "Migration summary",
        DryRunMode::Dry => "Dry run summary (nothing was changed)",
        DryRunMode::DryComplete => "Dry-complete summary (hooks recorded, nothing executed)",
    };
    println!("{} {}", heading.bold(), format!("[{}]", summary.run_id).dimmed());

    if summary.database_recreated {
        println!("  {} database recreated", "*".yellow());
    }
    match &summary.restore {
        Some(RestoreOutcome::Restored) => println!("  {} backup restored", "*".green()),
        Some(RestoreOutcome::Failed(e)) => println!("  {} backup restore failed: {}", "!".red(), e),
        None => {}
    }

    for report in &summary.hooks {
        let outcome = report.outcome.to_string();
        let outcome = match report.outcome {
            HookOutcome::Executed(_) => outcome.green(),
            HookOutcome::Projected(_) => outcome.cyan(),
            HookOutcome::MarkedComplete => outcome.blue(),
            HookOutcome::Skipped(_) => outcome.dimmed(),
        };
        println!("  {:<9} {:<40} {}", report.hook.as_str(), report.migration, outcome);
    }

    if let Some(purge) = &summary.purge {
        println!(
            "  {} removed {} dev hook rows and {} migration rows",
            "*".yellow(),
            purge.hooks_removed,
            purge.migrations_removed
        );
    }

    println!(
        "{} executed, {} skipped",
        summary.executed_count().to_string().green().bold(),
        summary.skipped_count()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tiller_core::RunMode;

    fn config_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_flags_override_file() {
        let file = config_file(
            "database:\n  url: postgres://localhost/app\nrun:\n  production: true\nmigrations:\n  paths: [a, b]\n",
        );
        let args = MigrateArgs {
            dev: true,
            dry_complete: true,
            host_name: Some("ci".to_string()),
            migrations: vec![PathBuf::from("c")],
            ..Default::default()
        };

        let (config, options) = prepare(Some(file.path()), Some("debug"), &args).unwrap();
        assert_eq!(options.mode, RunMode::Development);
        assert_eq!(options.dry_run, DryRunMode::DryComplete);
        assert_eq!(options.host_name, "ci");
        assert_eq!(config.migrations.paths, vec![PathBuf::from("c")]);
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[test]
    fn test_invalid_configuration_maps_to_configuration_error() {
        let file = config_file("run:\n  production: true\n  teardown: true\n");
        let err = prepare(Some(file.path()), None, &MigrateArgs::default()).unwrap_err();
        assert!(matches!(err, ExecutionError::Configuration(_)));
        assert_eq!(err.exit_code(), 2);

        let file = config_file("run:\n  production: true\n");
        let err = prepare(Some(file.path()), Some("shouty"), &MigrateArgs::default()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_missing_mode_is_rejected() {
        let file = config_file("migrations:\n  paths: [a]\n");
        let err = prepare(Some(file.path()), None, &MigrateArgs::default()).unwrap_err();
        assert!(err.to_string().contains("dev or production"));
    }
}
