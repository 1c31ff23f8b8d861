use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use super::commands::Commands;
use super::env::CliArgs;
use super::run::cmd_run;
use super::runtime::{init_logging, load_config};
use super::scrape::cmd_scrape;

pub async fn run() -> Result<()> {
    let cli = CliArgs::parse();

    init_logging(&cli.log_level, cli.json_logs)?;
    info!("Starting Wayfinder v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(cli.config.as_deref())?;

    let outcome = match cli.command {
        Commands::Scrape(args) => cmd_scrape(args, &config).await,
        Commands::Run(args) => cmd_run(args, &config).await,
    };
    match outcome {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(err) => {
            error!("Command failed: {:#}", err);
            Err(err)
        }
    }
}
