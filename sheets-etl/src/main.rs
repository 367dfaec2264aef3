use anyhow::Result;
use clap::Parser;

use sheets_etl::cli::commands::{handle_check_command, handle_run_command};
use sheets_etl::cli::{Cli, Commands, init_logging};
use sheets_etl::config::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    let config = Config::load(cli.config.as_deref())?;

    match cli.command() {
        Commands::Run(args) => handle_run_command(&config, &args).await,
        Commands::Check => handle_check_command(&config),
    }
}
