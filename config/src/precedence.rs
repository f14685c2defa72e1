//! # Configuration Precedence
//!
//! Merges configuration from multiple sources with precedence rules.
//!
//! # Precedence Order
//! 1. Environment variables (highest priority)
//! 2. Configuration file
//! 3. Default values (lowest priority)
//!
//! A field from the higher source wins only when it differs from the
//! default, so an unset environment variable never erases a file value.

use crate::config::{
    EmbeddingConfig, GraphSourceConfig, IngestionConfig, ObservabilityConfig, SearchConfig,
    TierguardConfig
};
use std::fmt::Debug;

/// Merge the environment configuration over the file configuration.
///
/// # M-CANONICAL-DOCS
///
/// ## Usage
/// ```rust,no_run
/// use config::{load_from_env, load_from_file, merge_env_over_file};
/// use std::path::Path;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let from_file = load_from_file(Path::new("tierguard.toml"))?;
///     let from_env = load_from_env()?;
///     let _config = merge_env_over_file(from_file, from_env);
///     Ok(())
/// }
/// ```
///
/// ## Deep Merge
/// Tier settings come from the file only; the environment carries no tier
/// mappings. Secrets are logged masked.
pub fn merge_env_over_file(file_config: TierguardConfig, env_config: TierguardConfig) -> TierguardConfig {
    let defaults = TierguardConfig::default();
    let mut config = file_config;
    let mut changes = Vec::new();

    merge_source(&mut config.source, &env_config.source, &defaults.source, &mut changes);
    merge_ingestion(
        &mut config.ingestion,
        &env_config.ingestion,
        &defaults.ingestion,
        &mut changes
    );
    merge_search(&mut config.search, &env_config.search, &defaults.search, &mut changes);
    merge_embedding(
        &mut config.embedding,
        &env_config.embedding,
        &defaults.embedding,
        &mut changes
    );
    merge_observability(
        &mut config.observability,
        &env_config.observability,
        &defaults.observability,
        &mut changes
    );

    if !changes.is_empty() {
        tracing::info!(changes = ?changes, "Configuration overridden from environment");
    }

    config
}

fn take<T>(base: &mut T, over: &T, default: &T, path: &str, changes: &mut Vec<String>)
where
    T: PartialEq + Clone + Debug
{
    if over != default && over != base {
        changes.push(format!("{path} = {over:?}"));
        base.clone_from(over);
    }
}

fn take_secret(
    base: &mut String,
    over: &String,
    default: &String,
    path: &str,
    changes: &mut Vec<String>
) {
    if over != default && over != base {
        changes.push(format!("{path} = ****"));
        base.clone_from(over);
    }
}

fn merge_source(
    base: &mut GraphSourceConfig,
    over: &GraphSourceConfig,
    default: &GraphSourceConfig,
    changes: &mut Vec<String>
) {
    take(&mut base.tenant_id, &over.tenant_id, &default.tenant_id, "source.tenant_id", changes);
    take(&mut base.client_id, &over.client_id, &default.client_id, "source.client_id", changes);
    take_secret(
        &mut base.client_secret,
        &over.client_secret,
        &default.client_secret,
        "source.client_secret",
        changes
    );
    take(
        &mut base.authority_host,
        &over.authority_host,
        &default.authority_host,
        "source.authority_host",
        changes
    );
    take(
        &mut base.graph_base_url,
        &over.graph_base_url,
        &default.graph_base_url,
        "source.graph_base_url",
        changes
    );
    take(&mut base.scope, &over.scope, &default.scope, "source.scope", changes);
    take(
        &mut base.site_domain,
        &over.site_domain,
        &default.site_domain,
        "source.site_domain",
        changes
    );
    take(&mut base.site_name, &over.site_name, &default.site_name, "source.site_name", changes);
    take(
        &mut base.timeout_seconds,
        &over.timeout_seconds,
        &default.timeout_seconds,
        "source.timeout_seconds",
        changes
    );
    take(
        &mut base.refresh_skew_seconds,
        &over.refresh_skew_seconds,
        &default.refresh_skew_seconds,
        "source.refresh_skew_seconds",
        changes
    );
    take(
        &mut base.retry.max_retries,
        &over.retry.max_retries,
        &default.retry.max_retries,
        "source.retry.max_retries",
        changes
    );
}

fn merge_ingestion(
    base: &mut IngestionConfig,
    over: &IngestionConfig,
    default: &IngestionConfig,
    changes: &mut Vec<String>
) {
    take(
        &mut base.max_concurrency,
        &over.max_concurrency,
        &default.max_concurrency,
        "ingestion.max_concurrency",
        changes
    );
    take(
        &mut base.file_formats,
        &over.file_formats,
        &default.file_formats,
        "ingestion.file_formats",
        changes
    );
    take(
        &mut base.folder_path,
        &over.folder_path,
        &default.folder_path,
        "ingestion.folder_path",
        changes
    );
    take(
        &mut base.modified_within_minutes,
        &over.modified_within_minutes,
        &default.modified_within_minutes,
        "ingestion.modified_within_minutes",
        changes
    );
}

fn merge_search(
    base: &mut SearchConfig,
    over: &SearchConfig,
    default: &SearchConfig,
    changes: &mut Vec<String>
) {
    take(&mut base.endpoint, &over.endpoint, &default.endpoint, "search.endpoint", changes);
    take(
        &mut base.index_name,
        &over.index_name,
        &default.index_name,
        "search.index_name",
        changes
    );
    take_secret(&mut base.api_key, &over.api_key, &default.api_key, "search.api_key", changes);
    take(&mut base.top_k, &over.top_k, &default.top_k, "search.top_k", changes);
}

fn merge_embedding(
    base: &mut EmbeddingConfig,
    over: &EmbeddingConfig,
    default: &EmbeddingConfig,
    changes: &mut Vec<String>
) {
    take(&mut base.endpoint, &over.endpoint, &default.endpoint, "embedding.endpoint", changes);
    take_secret(&mut base.api_key, &over.api_key, &default.api_key, "embedding.api_key", changes);
    take(
        &mut base.deployment,
        &over.deployment,
        &default.deployment,
        "embedding.deployment",
        changes
    );
    take(
        &mut base.api_version,
        &over.api_version,
        &default.api_version,
        "embedding.api_version",
        changes
    );
}

fn merge_observability(
    base: &mut ObservabilityConfig,
    over: &ObservabilityConfig,
    default: &ObservabilityConfig,
    changes: &mut Vec<String>
) {
    take(
        &mut base.log_level,
        &over.log_level,
        &default.log_level,
        "observability.log_level",
        changes
    );
    take(
        &mut base.log_format,
        &over.log_format,
        &default.log_format,
        "observability.log_format",
        changes
    );
}
