//! CLI command definitions for stride-analytics.
//!
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod check;
pub mod export;

use clap::{Args, Parser, Subcommand};
use export::ExportArgs;
use std::path::PathBuf;

/// Read-only analytics dashboard and report exporter
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to the replica database (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Only report on rows of this organization (overrides config)
    #[arg(long, global = true)]
    pub org: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    /// Port for the web dashboard (default: 31995)
    #[arg(long, global = true)]
    pub port: Option<u16>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the dashboard (default if no subcommand given)
    Serve,

    /// Verify the replica can be read and print what it holds
    Check,

    /// Write a report as CSV (or the schema report as JSON)
    Export(ExportArgs),

    /// Create an empty reporting database
    InitDb(InitDbArgs),
}

#[derive(Args, Debug)]
pub struct InitDbArgs {
    /// Where to create the database (default: the configured replica path)
    #[arg(long, value_name = "FILE")]
    pub path: Option<PathBuf>,
}
