//! Configuration loading, logging setup and component wiring for commands.

use crate::ux_error;
use anyhow::{Context, Result, anyhow};
use config::{ObservabilityConfig, TierguardConfig};
use graph_source::{AuthSession, AzureAdIdentityProvider, GraphContentSource};
use retrieval::{AzureOpenAiEmbeddings, AzureSearchStore, SecureRetriever, SearchPolicy};
use std::path::Path;
use std::sync::Arc;
use tg_core::{ContentSource, EmbeddingService, IndexStore};
use tiering::GroupTierMap;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment over file over defaults.
pub fn load_config(path: Option<&Path>) -> Result<TierguardConfig> {
    let env = config::load_from_env()
        .map_err(|e| anyhow!("Failed to read configuration from the environment: {e}"))?;

    match path {
        Some(path) => {
            let file = config::load_from_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            Ok(config::merge_env_over_file(file, env))
        }
        None => Ok(env)
    }
}

/// Logs go to stderr so `--json` output stays parseable. `RUST_LOG` wins over
/// the configured level.
pub fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.log_format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    if let Err(e) = result {
        eprintln!("Failed to initialize logging: {e}");
    }
}

pub fn ensure_valid(config: &TierguardConfig) -> Result<()> {
    config::validate(config).map_err(|e| ux_error::invalid_config(&e))?;
    Ok(())
}

/// Fails when any missing setting falls under one of `sections`.
pub fn require(config: &TierguardConfig, sections: &[&str], command: &str) -> Result<()> {
    let missing: Vec<String> = config::missing_for_ingestion(config)
        .into_iter()
        .filter(|field| sections.iter().any(|s| field.starts_with(&format!("{s}."))))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ux_error::missing_settings(command, &missing).into())
    }
}

pub fn tier_map(config: &TierguardConfig) -> Result<Arc<GroupTierMap>> {
    let map = GroupTierMap::from_config(&config.tiers).context("Invalid tier configuration")?;
    Ok(Arc::new(map))
}

pub fn content_source(config: &TierguardConfig) -> Result<Arc<dyn ContentSource>> {
    let provider = AzureAdIdentityProvider::new(config.source.timeout())?;
    let session = AuthSession::from_config(Arc::new(provider), &config.source);
    let source = GraphContentSource::new(&config.source, Arc::new(session))?;
    Ok(Arc::new(source))
}

pub fn embeddings(config: &TierguardConfig) -> Result<Arc<dyn EmbeddingService>> {
    Ok(Arc::new(AzureOpenAiEmbeddings::new(&config.embedding)?))
}

pub fn index_store(config: &TierguardConfig) -> Result<Arc<dyn IndexStore>> {
    Ok(Arc::new(AzureSearchStore::new(&config.search)?))
}

pub fn retriever(config: &TierguardConfig) -> Result<SecureRetriever> {
    Ok(
        SecureRetriever::new(embeddings(config)?, index_store(config)?)
            .with_policy(SearchPolicy::from(&config.search))
    )
}
