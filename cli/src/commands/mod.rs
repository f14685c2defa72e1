pub mod ingest;
pub mod search;
pub mod settings;
pub mod tiers;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tierguard",
    author,
    version,
    about = "Tierguard - permission-aware ingestion and tier-filtered search",
    long_about = "Tags SharePoint documents with a security tier derived from their \
                  permissions, indexes them, and searches only within the tiers or groups \
                  a requester belongs to.\n\nSettings come from the environment, optionally \
                  layered over a TOML or YAML file given with --config."
)]
pub struct Cli {
    #[arg(long, global = true, env = "TIERGUARD_CONFIG", help = "Config file (TOML or YAML)")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "List, tag and index documents from the document library")]
    Ingest(ingest::IngestArgs),

    #[command(about = "Search within a security tier or a set of groups")]
    Search(search::SearchArgs),

    #[command(subcommand, about = "Inspect tiers and resolve grantees to a tier")]
    Tiers(tiers::TiersCommand),

    #[command(subcommand, about = "Validate configuration")]
    Config(settings::ConfigCommand)
}
