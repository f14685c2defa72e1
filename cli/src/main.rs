use anyhow::Result;
use clap::Parser;

mod commands;
mod output;
mod runtime;
pub mod ux_error;

use commands::{Cli, Commands};
use ux_error::UxError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        match err.downcast_ref::<UxError>() {
            Some(ux) => ux.display(),
            None => output::error(&format!("{err:#}"))
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = runtime::load_config(cli.config.as_deref())?;
    runtime::init_tracing(&config.observability);

    match cli.command {
        Commands::Ingest(args) => commands::ingest::run(args, &config).await,
        Commands::Search(args) => commands::search::run(args, &config).await,
        Commands::Tiers(cmd) => commands::tiers::run(cmd, &config),
        Commands::Config(cmd) => commands::settings::run(cmd, config)
    }
}
