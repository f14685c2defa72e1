use crate::{output, runtime, ux_error};
use anyhow::Result;
use clap::{Args, Subcommand};
use config::TierguardConfig;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Validate configuration and list settings still missing")]
    Validate(ValidateArgs)
}

#[derive(Args)]
pub struct ValidateArgs {
    #[arg(long, help = "Validate this file (merged with the environment) instead of --config")]
    pub file: Option<PathBuf>,

    #[arg(long, help = "Output as JSON")]
    pub json: bool
}

pub fn run(cmd: ConfigCommand, config: TierguardConfig) -> Result<()> {
    match cmd {
        ConfigCommand::Validate(args) => validate(args, config)
    }
}

fn validate(args: ValidateArgs, config: TierguardConfig) -> Result<()> {
    let config = match &args.file {
        Some(path) => runtime::load_config(Some(path))?,
        None => config
    };
    let errors = config::validate(&config).err();
    let missing = config::missing_for_ingestion(&config);

    if args.json {
        output::json(&serde_json::json!({
            "valid": errors.is_none(),
            "errors": errors.as_ref().map(ToString::to_string),
            "missing": missing
        }))?;
    } else {
        output::header("Configuration");
        println!();
        if errors.is_none() {
            output::success("Configuration is valid");
        }
        if !missing.is_empty() {
            output::warn(&format!(
                "Not set yet (needed for live ingestion and search): {}",
                missing.join(", ")
            ));
        }
    }

    match errors {
        Some(e) => Err(ux_error::invalid_config(&e).into()),
        None => Ok(())
    }
}
