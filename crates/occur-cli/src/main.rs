use std::sync::Arc;

use clap::Parser;
use occur_core::db;
use occur_core::error::CoreError;
use occur_core::repository::SqliteRepository;
use occur_core::VirtualInstanceService;
use owo_colors::{OwoColorize, Style};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;
mod parser;
mod util;
mod views;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    let config = match config::Config::new() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} Invalid configuration: {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)))
        .with_writer(std::io::stderr)
        .init();
    tracing::debug!(database = %config.database_path, window_days = config.default_window_days, "configuration loaded");

    let db_pool = match db::establish_connection(&config.database_path).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };
    let repository = Arc::new(SqliteRepository::new(db_pool));
    let service = match VirtualInstanceService::open(repository.clone(), repository).await {
        Ok(service) => service,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        cli::Commands::Template(command) => {
            commands::template::template_command(&service, command, &config).await
        }
        cli::Commands::List(command) => commands::list::list_instances(&service, command, &config).await,
        cli::Commands::Set(command) => commands::set::set_instance(&service, command).await,
        cli::Commands::Reset(command) => commands::reset::reset_instance(&service, command).await,
    };

    if let Err(e) = result {
        handle_error(e);
        std::process::exit(1);
    }
}

fn handle_error(err: anyhow::Error) {
    let error_style = Style::new().red().bold();

    if let Some(core_error) = err.downcast_ref::<CoreError>() {
        match core_error {
            CoreError::NotFound(s) => {
                eprintln!("{} {}", "Error:".style(error_style), s);
            }
            CoreError::AmbiguousId(templates) => {
                eprintln!("{}", "Error: Ambiguous ID.".style(error_style));
                eprintln!("Did you mean one of these?");
                for (id, title) in templates {
                    eprintln!("  {} ({})", id.yellow(), title);
                }
            }
            CoreError::InvalidInput(s) => {
                eprintln!("{} Invalid input: {}", "Error:".style(error_style), s);
            }
            CoreError::PersistenceDeferred { key, source } => {
                eprintln!(
                    "{} Change to {} could not be saved and was discarded: {}",
                    "Error:".style(error_style),
                    key,
                    source
                );
            }
            _ => eprintln!("{} {}", "Error:".style(error_style), err),
        }
    } else {
        eprintln!("{} {}", "Error:".style(error_style), err);
    }
}
