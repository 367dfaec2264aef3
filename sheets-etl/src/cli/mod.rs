//! Command-line interface

pub mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub use logging::init_logging;

#[derive(Debug, Parser)]
#[command(name = "sheets-etl", version, about = "Move form responses from Google Sheets into the store")]
pub struct Cli {
    /// Config file (default: $SHEETS_ETL_CONFIG, ./sheets-etl.toml, user config dir)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also append log output to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Process every form kind once (the default)
    Run(RunArgs),
    /// Validate the configuration without touching any sheet or database
    Check,
}

#[derive(Debug, Default, Args)]
pub struct RunArgs {
    /// Read and normalize rows but do not submit them
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// The subcommand to execute, `run` when none was given
    pub fn command(self) -> Commands {
        self.command.unwrap_or(Commands::Run(RunArgs::default()))
    }
}
