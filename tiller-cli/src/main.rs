use clap::Parser;
use colored::Colorize;
use std::process::ExitCode;

mod cli;
mod commands;

use cli::{Cli, Commands, ConfigCommands};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Migrate(args) => {
            let result =
                commands::migrate::handle_migrate(cli.config.as_deref(), cli.log_level.as_deref(), args).await;
            match result {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    tracing::error!("Migration failed: {}", e);
                    eprintln!("{} {}", "error:".red().bold(), e);
                    ExitCode::from(e.exit_code())
                }
            }
        }
        Commands::Config { config_cmd } => {
            let _ = tiller_logging::init_simple_tracing(cli.log_level.as_deref().unwrap_or("warn"));
            let result = match config_cmd {
                ConfigCommands::Validate { config_file } => commands::config::handle_config_validate(&config_file),
                ConfigCommands::Generate { output, force } => commands::config::handle_config_generate(&output, force),
            };
            match result {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("{} {:#}", "error:".red().bold(), e);
                    ExitCode::FAILURE
                }
            }
        }
    }
}
