use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rr_cli::commands::{driver, drivers, ingest, report, status};
use rr_cli::{Cli, Commands, Config};
use rr_core::RaceEngine;
use rr_db::Database;

/// Load config and open the engine, ensuring the database directory exists.
fn open_engine(config_path: Option<&std::path::Path>) -> Result<(RaceEngine<Database>, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = Database::open_with_timeout(&config.database_path, config.busy_timeout())
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    let engine = RaceEngine::open(db)
        .map_err(|err| anyhow::anyhow!("failed to load stored race: {err}"))?;
    Ok((engine, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so report output stays clean
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let mut stdout = io::stdout().lock();

    match &cli.command {
        Some(Commands::Ingest { data_dir, json }) => {
            let (engine, config) = open_engine(cli.config.as_deref())?;
            let data_dir = data_dir.as_ref().unwrap_or(&config.data_dir);
            let lock = ingest::lock_path(&config.database_path);
            ingest::run(&mut stdout, &engine, data_dir, &lock, *json)?;
        }
        Some(Commands::Report { order, json }) => {
            let (engine, config) = open_engine(cli.config.as_deref())?;
            report::run(&mut stdout, &engine, order, *json, config.top_n)?;
        }
        Some(Commands::Drivers { json }) => {
            let (engine, _config) = open_engine(cli.config.as_deref())?;
            drivers::run(&mut stdout, &engine, *json)?;
        }
        Some(Commands::Driver { code, json }) => {
            let (engine, _config) = open_engine(cli.config.as_deref())?;
            driver::run(&mut stdout, &engine, code, *json)?;
        }
        Some(Commands::Status) => {
            let (engine, config) = open_engine(cli.config.as_deref())?;
            status::run(&mut stdout, &engine, &config.database_path)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
