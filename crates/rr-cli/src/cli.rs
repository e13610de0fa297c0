//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Race lap report.
///
/// Reconciles driver abbreviations with start and end logs and ranks the
/// resulting lap times.
#[derive(Debug, Parser)]
#[command(name = "rr", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load abbreviations.txt, start.log and end.log into the database.
    Ingest {
        /// Directory holding the three source files (defaults to config `data_dir`).
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Print the ingest report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show lap results ranked by time.
    Report {
        /// Sort order: asc (fastest first) or desc.
        #[arg(long, default_value = "asc")]
        order: String,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List all drivers by code.
    Drivers {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show a single driver's result.
    Driver {
        /// Driver code, e.g. SVF.
        code: String,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show database location and the last ingestion.
    Status,
}
