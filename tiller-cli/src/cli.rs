//! CLI argument parsing definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply migrations to the target database
    Migrate(MigrateArgs),

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },
}

#[derive(Args, Debug, Default)]
pub struct MigrateArgs {
    /// Migration directories or files, in application order (replaces the configured list)
    #[arg(value_name = "PATH")]
    pub migrations: Vec<PathBuf>,

    /// Development mode: re-apply migrations that have a teardown
    #[arg(long, conflicts_with = "production")]
    pub dev: bool,

    /// Production mode: every hook runs at most once
    #[arg(long)]
    pub production: bool,

    /// Only tear down development state
    #[arg(long)]
    pub teardown: bool,

    /// Log what would run without executing anything
    #[arg(long, conflicts_with = "dry_complete")]
    pub dry: bool,

    /// Record every hook as applied without executing it (still purges development bookkeeping)
    #[arg(long)]
    pub dry_complete: bool,

    /// Recreate the database and restore this backup before migrating
    #[arg(long, value_name = "FILE", conflicts_with = "teardown")]
    pub restore: Option<PathBuf>,

    /// Restore only the schema from the backup
    #[arg(long, conflicts_with = "data_only")]
    pub schema_only: bool,

    /// Restore only the data from the backup
    #[arg(long)]
    pub data_only: bool,

    /// Target database URL
    #[arg(long, value_name = "URL")]
    pub database_url: Option<String>,

    /// Comma separated search_path for every session
    #[arg(long, value_name = "SCHEMAS")]
    pub search_path: Option<String>,

    /// Keep the server's default search_path instead of forcing public
    #[arg(long)]
    pub keep_default_search_path: bool,

    /// Host name recorded on hook rows
    #[arg(long, value_name = "NAME")]
    pub host_name: Option<String>,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(long, value_name = "PATH")]
        config_file: PathBuf,
    },

    /// Generate a sample configuration file
    Generate {
        /// Output file path
        #[arg(long, value_name = "PATH")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_migrate() {
        let cli = Cli::parse_from([
            "tiller",
            "--log-level",
            "debug",
            "migrate",
            "--dev",
            "--dry",
            "--search-path",
            "app,public",
            "migrations/002-b",
            "migrations/001-a",
        ]);

        let Commands::Migrate(args) = cli.command else {
            panic!("expected migrate");
        };
        assert!(args.dev && args.dry);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(args.search_path.as_deref(), Some("app,public"));
        assert_eq!(
            args.migrations,
            vec![PathBuf::from("migrations/002-b"), PathBuf::from("migrations/001-a")]
        );
    }

    #[test]
    fn test_conflicting_flags_are_rejected() {
        assert!(Cli::try_parse_from(["tiller", "migrate", "--dev", "--production"]).is_err());
        assert!(Cli::try_parse_from(["tiller", "migrate", "--dev", "--dry", "--dry-complete"]).is_err());
        assert!(Cli::try_parse_from(["tiller", "migrate", "--schema-only", "--data-only"]).is_err());
        assert!(Cli::try_parse_from(["tiller", "migrate", "--dev", "--teardown", "--restore", "x.dump"]).is_err());
    }

    #[test]
    fn test_dry_complete_help_mentions_purge() {
        let command = Cli::command();
        let migrate = command.find_subcommand("migrate").unwrap();
        let arg = migrate
            .get_arguments()
            .find(|arg| arg.get_id() == "dry_complete")
            .unwrap();
        let help = arg.get_help().unwrap().to_string();
        assert!(help.contains("still purges development bookkeeping"));
    }
}
