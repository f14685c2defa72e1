//! # Environment Variable Loader
//!
//! Loads configuration from environment variables following 12-factor app
//! principles.
//!
//! # Naming Convention
//! - `TENANT_ID`, `CLIENT_ID`, `CLIENT_SECRET`: app registration
//! - `TG_*`: Tierguard settings
//! - `AZURE_SEARCH_*`, `AZURE_COGNITIVE_SEARCH_*`: search index
//! - `OPENAI_*`, `AZURE_OPENAI_*`: embedding deployment

use crate::config::{
    EmbeddingConfig, GraphSourceConfig, IngestionConfig, ObservabilityConfig, RetryConfig,
    SearchConfig, TierConfig, TierguardConfig
};
use std::env;

/// Load configuration from environment variables.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Builds a [`TierguardConfig`] where every field not present in the
/// environment keeps its default. Unparseable numeric values also fall back
/// to the default.
///
/// ## Usage
/// ```rust,no_run
/// use config::load_from_env;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = load_from_env()?;
///     println!("Site: {}", config.source.site_name);
///     Ok(())
/// }
/// ```
///
/// ## Environment Variables
/// ### Source
/// - `TENANT_ID`, `CLIENT_ID`, `CLIENT_SECRET`: app registration
/// - `TG_AUTHORITY_HOST`: token authority (default: login.microsoftonline.com)
/// - `TG_GRAPH_BASE_URL`: Graph API root (default: graph.microsoft.com/v1.0)
/// - `TG_SITE_DOMAIN`, `TG_SITE_NAME`: SharePoint site
/// - `TG_SOURCE_TIMEOUT_SECONDS`: per-request timeout (default: 30)
/// - `TG_MAX_RETRIES`: retry attempts for transient failures (default: 3)
///
/// ### Ingestion
/// - `TG_MAX_CONCURRENCY`: documents processed concurrently (default: 4)
/// - `TG_FILE_FORMATS`: comma separated extensions (default: docx,pdf,txt,md)
/// - `TG_FOLDER_PATH`: restrict listing to a folder
/// - `TG_MODIFIED_WITHIN_MINUTES`: restrict listing to recent changes
///
/// ### Search
/// - `AZURE_SEARCH_SERVICE_ENDPOINT`, `AZURE_SEARCH_ADMIN_KEY`
/// - `AZURE_COGNITIVE_SEARCH_INDEX_NAME` (default: tierguard-documents)
/// - `TG_TOP_K`: hits returned (default: 5)
///
/// ### Embedding
/// - `OPENAI_ENDPOINT`, `OPENAI_API_KEY`
/// - `AZURE_OPENAI_API_VERSION` (default: 2023-05-15)
/// - `TG_EMBEDDING_DEPLOYMENT` (default: foundational-ada)
///
/// ### Observability
/// - `TG_LOG_LEVEL` (default: info), `TG_LOG_FORMAT` (text/json)
pub fn load_from_env() -> Result<TierguardConfig, Box<dyn std::error::Error>> {
    let config = TierguardConfig {
        source: load_source_from_env()?,
        tiers: TierConfig::default(),
        ingestion: load_ingestion_from_env()?,
        search: load_search_from_env()?,
        embedding: load_embedding_from_env()?,
        observability: load_observability_from_env()?
    };

    Ok(config)
}

fn load_source_from_env() -> Result<GraphSourceConfig, Box<dyn std::error::Error>> {
    let defaults = GraphSourceConfig::default();
    Ok(GraphSourceConfig {
        tenant_id: env::var("TENANT_ID").unwrap_or_default(),
        client_id: env::var("CLIENT_ID").unwrap_or_default(),
        client_secret: env::var("CLIENT_SECRET").unwrap_or_default(),
        authority_host: env::var("TG_AUTHORITY_HOST").unwrap_or(defaults.authority_host),
        graph_base_url: env::var("TG_GRAPH_BASE_URL").unwrap_or(defaults.graph_base_url),
        scope: env::var("TG_GRAPH_SCOPE").unwrap_or(defaults.scope),
        site_domain: env::var("TG_SITE_DOMAIN").unwrap_or_default(),
        site_name: env::var("TG_SITE_NAME").unwrap_or_default(),
        timeout_seconds: parse_env("TG_SOURCE_TIMEOUT_SECONDS").unwrap_or(defaults.timeout_seconds),
        refresh_skew_seconds: parse_env("TG_REFRESH_SKEW_SECONDS")
            .unwrap_or(defaults.refresh_skew_seconds),
        retry: RetryConfig {
            max_retries: parse_env("TG_MAX_RETRIES").unwrap_or(defaults.retry.max_retries),
            ..defaults.retry
        }
    })
}

fn load_ingestion_from_env() -> Result<IngestionConfig, Box<dyn std::error::Error>> {
    let defaults = IngestionConfig::default();
    Ok(IngestionConfig {
        max_concurrency: parse_env("TG_MAX_CONCURRENCY").unwrap_or(defaults.max_concurrency),
        file_formats: env::var("TG_FILE_FORMATS")
            .map(|v| parse_list(&v))
            .unwrap_or(defaults.file_formats),
        folder_path: env::var("TG_FOLDER_PATH").ok().filter(|v| !v.is_empty()),
        modified_within_minutes: parse_env("TG_MODIFIED_WITHIN_MINUTES").ok(),
        ..defaults
    })
}

fn load_search_from_env() -> Result<SearchConfig, Box<dyn std::error::Error>> {
    let defaults = SearchConfig::default();
    Ok(SearchConfig {
        endpoint: env::var("AZURE_SEARCH_SERVICE_ENDPOINT").unwrap_or_default(),
        index_name: env::var("AZURE_COGNITIVE_SEARCH_INDEX_NAME").unwrap_or(defaults.index_name),
        api_key: env::var("AZURE_SEARCH_ADMIN_KEY").unwrap_or_default(),
        top_k: parse_env("TG_TOP_K").unwrap_or(defaults.top_k),
        ..defaults
    })
}

fn load_embedding_from_env() -> Result<EmbeddingConfig, Box<dyn std::error::Error>> {
    let defaults = EmbeddingConfig::default();
    Ok(EmbeddingConfig {
        endpoint: env::var("OPENAI_ENDPOINT").unwrap_or_default(),
        api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
        deployment: env::var("TG_EMBEDDING_DEPLOYMENT").unwrap_or(defaults.deployment),
        api_version: env::var("AZURE_OPENAI_API_VERSION").unwrap_or(defaults.api_version),
        ..defaults
    })
}

fn load_observability_from_env() -> Result<ObservabilityConfig, Box<dyn std::error::Error>> {
    let defaults = ObservabilityConfig::default();
    Ok(ObservabilityConfig {
        log_level: env::var("TG_LOG_LEVEL").unwrap_or(defaults.log_level),
        log_format: env::var("TG_LOG_FORMAT").unwrap_or(defaults.log_format)
    })
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_env<T>(key: &str) -> Result<T, Box<dyn std::error::Error>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static
{
    match env::var(key) {
        Ok(s) => s
            .parse::<T>()
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error>),
        Err(e) => Err(Box::new(e) as Box<dyn std::error::Error>)
    }
}
