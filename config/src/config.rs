//! # Configuration Structures
//!
//! All configuration structures for Tierguard.
//!
//! All structures:
//! - Use `serde` for serialization/deserialization with per-field defaults
//! - Use `validator` for range and length checks
//! - Can be loaded from environment variables, TOML or YAML

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tg_core::{SecurityTier, TierPolicy};
use validator::Validate;

/// Top-level configuration.
///
/// ## Fields
/// - `source`: Microsoft Graph connection and credentials
/// - `tiers`: tier priority, default tier and seed grantee mappings
/// - `ingestion`: worker limits, file filters, chunking
/// - `search`: index endpoint and retrieval policy
/// - `embedding`: embedding deployment
/// - `observability`: logging
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default, PartialEq)]
pub struct TierguardConfig {
    #[serde(default)]
    #[validate(nested)]
    pub source: GraphSourceConfig,

    #[serde(default)]
    #[validate(nested)]
    pub tiers: TierConfig,

    #[serde(default)]
    #[validate(nested)]
    pub ingestion: IngestionConfig,

    #[serde(default)]
    #[validate(nested)]
    pub search: SearchConfig,

    #[serde(default)]
    #[validate(nested)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    #[validate(nested)]
    pub observability: ObservabilityConfig
}

/// Microsoft Graph content source configuration.
///
/// `tenant_id`, `client_id` and `client_secret` are empty by default and are
/// expected from the environment (`TENANT_ID`, `CLIENT_ID`, `CLIENT_SECRET`).
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct GraphSourceConfig {
    #[serde(default)]
    pub tenant_id: String,

    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    #[serde(default = "default_authority_host")]
    #[validate(url)]
    pub authority_host: String,

    #[serde(default = "default_graph_base_url")]
    #[validate(url)]
    pub graph_base_url: String,

    #[serde(default = "default_graph_scope")]
    #[validate(length(min = 1))]
    pub scope: String,

    #[serde(default)]
    pub site_domain: String,

    #[serde(default)]
    pub site_name: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    #[validate(range(min = 1, max = 300))]
    pub timeout_seconds: u64,

    /// Refresh a cached token this many seconds before it expires
    #[serde(default = "default_refresh_skew_seconds")]
    #[validate(range(max = 3600))]
    pub refresh_skew_seconds: u64,

    #[serde(default)]
    #[validate(nested)]
    pub retry: RetryConfig
}

fn default_authority_host() -> String {
    "https://login.microsoftonline.com".to_string()
}

fn default_graph_base_url() -> String {
    "https://graph.microsoft.com/v1.0".to_string()
}

fn default_graph_scope() -> String {
    "https://graph.microsoft.com/.default".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_refresh_skew_seconds() -> u64 {
    300
}

impl Default for GraphSourceConfig {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            authority_host: default_authority_host(),
            graph_base_url: default_graph_base_url(),
            scope: default_graph_scope(),
            site_domain: String::new(),
            site_name: String::new(),
            timeout_seconds: default_timeout_seconds(),
            refresh_skew_seconds: default_refresh_skew_seconds(),
            retry: RetryConfig::default()
        }
    }
}

impl GraphSourceConfig {
    /// `{authority_host}/{tenant_id}`
    pub fn authority(&self) -> String {
        format!(
            "{}/{}",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Names of required credential fields that are still empty.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        [
            ("tenant_id", &self.tenant_id),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("site_domain", &self.site_domain),
            ("site_name", &self.site_name)
        ]
        .into_iter()
        .filter(|(_, v)| v.is_empty())
        .map(|(k, _)| k)
        .collect()
    }
}

/// Bounded retry with exponential backoff, applied at HTTP call sites.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    #[validate(range(max = 10))]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    #[validate(range(min = 1))]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    #[validate(range(min = 1))]
    pub max_backoff_ms: u64
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    30000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms()
        }
    }
}

/// Tier set, priority and seed mappings.
///
/// ## Validation
/// `default_tier` and every seed tier must appear in `priority`, and
/// `priority` must not repeat a tier.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[validate(schema(function = "validate_tier_config"))]
pub struct TierConfig {
    /// Highest priority first
    #[serde(default = "default_priority")]
    #[validate(length(min = 1))]
    pub priority: Vec<String>,

    #[serde(default = "default_tier_name")]
    #[validate(length(min = 1))]
    pub default_tier: String,

    /// Grantee display name to tier
    #[serde(default = "default_seed_mappings")]
    pub seed_mappings: BTreeMap<String, String>
}

fn default_priority() -> Vec<String> {
    vec![
        "Group_critical".to_string(),
        "Group_medium".to_string(),
        "Group_low".to_string(),
    ]
}

fn default_tier_name() -> String {
    "Group_medium".to_string()
}

fn default_seed_mappings() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("Contoso Owners".to_string(), "Group_critical".to_string()),
        ("Contoso Visitors".to_string(), "Group_medium".to_string()),
        ("Contoso Members".to_string(), "Group_low".to_string())
    ])
}

fn validate_tier_config(tiers: &TierConfig) -> Result<(), validator::ValidationError> {
    tiers.to_policy().map(|_| ()).map_err(|e| {
        let mut err = validator::ValidationError::new("tier_policy");
        err.message = Some(e.to_string().into());
        err
    })
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            priority: default_priority(),
            default_tier: default_tier_name(),
            seed_mappings: default_seed_mappings()
        }
    }
}

impl TierConfig {
    pub fn to_policy(&self) -> Result<TierPolicy, errors::PolicyError> {
        let priority = self
            .priority
            .iter()
            .map(|t| t.parse::<SecurityTier>())
            .collect::<Result<Vec<_>, _>>()?;
        let default_tier = self.default_tier.parse::<SecurityTier>()?;
        let policy = TierPolicy::new(priority, default_tier)?;

        for tier in self.seed_mappings.values() {
            policy.ensure_known(&SecurityTier::new(tier.clone()))?;
        }

        Ok(policy)
    }

    pub fn seed_entries(&self) -> Vec<(String, SecurityTier)> {
        self.seed_mappings
            .iter()
            .map(|(grantee, tier)| (grantee.clone(), SecurityTier::new(tier.clone())))
            .collect()
    }
}

/// Ingestion pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[validate(schema(function = "validate_chunking"))]
pub struct IngestionConfig {
    /// Documents processed concurrently
    #[serde(default = "default_max_concurrency")]
    #[validate(range(min = 1, max = 64))]
    pub max_concurrency: usize,

    /// Allowed file extensions, without the dot
    #[serde(default = "default_file_formats")]
    pub file_formats: Vec<String>,

    #[serde(default)]
    pub folder_path: Option<String>,

    #[serde(default)]
    pub modified_within_minutes: Option<u64>,

    /// Characters per chunk
    #[serde(default = "default_chunk_size")]
    #[validate(range(min = 100, max = 100_000))]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default = "default_upsert_batch_size")]
    #[validate(range(min = 1, max = 1000))]
    pub upsert_batch_size: usize
}

fn default_max_concurrency() -> usize {
    4
}

fn default_file_formats() -> Vec<String> {
    vec![
        "docx".to_string(),
        "pdf".to_string(),
        "txt".to_string(),
        "md".to_string(),
    ]
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_upsert_batch_size() -> usize {
    100
}

fn validate_chunking(ingestion: &IngestionConfig) -> Result<(), validator::ValidationError> {
    if ingestion.chunk_overlap >= ingestion.chunk_size {
        return Err(validator::ValidationError::new(
            "chunk_overlap must be smaller than chunk_size"
        ));
    }
    Ok(())
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            file_formats: default_file_formats(),
            folder_path: None,
            modified_within_minutes: None,
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            upsert_batch_size: default_upsert_batch_size()
        }
    }
}

/// Search index and retrieval policy.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct SearchConfig {
    #[serde(default)]
    pub endpoint: String,

    #[serde(default = "default_index_name")]
    #[validate(length(min = 1, max = 128))]
    pub index_name: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_search_api_version")]
    pub api_version: String,

    #[serde(default = "default_semantic_configuration")]
    pub semantic_configuration: String,

    #[serde(default = "default_vector_field")]
    pub vector_field: String,

    /// Nearest neighbours requested from the vector side of a hybrid query
    #[serde(default = "default_vector_k")]
    #[validate(range(min = 1, max = 1000))]
    pub vector_k: usize,

    #[serde(default = "default_top_k")]
    #[validate(range(min = 1, max = 1000))]
    pub top_k: usize,

    /// Display bound for each returned hit
    #[serde(default = "default_max_content_chars")]
    #[validate(range(min = 1))]
    pub max_content_chars: usize,

    #[serde(default = "default_timeout_seconds")]
    #[validate(range(min = 1, max = 300))]
    pub timeout_seconds: u64
}

fn default_index_name() -> String {
    "tierguard-documents".to_string()
}

fn default_search_api_version() -> String {
    "2023-11-01".to_string()
}

fn default_semantic_configuration() -> String {
    "config".to_string()
}

fn default_vector_field() -> String {
    "content_vector".to_string()
}

fn default_vector_k() -> usize {
    50
}

fn default_top_k() -> usize {
    5
}

fn default_max_content_chars() -> usize {
    1000
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            index_name: default_index_name(),
            api_key: String::new(),
            api_version: default_search_api_version(),
            semantic_configuration: default_semantic_configuration(),
            vector_field: default_vector_field(),
            vector_k: default_vector_k(),
            top_k: default_top_k(),
            max_content_chars: default_max_content_chars(),
            timeout_seconds: default_timeout_seconds()
        }
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Azure OpenAI embedding deployment.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub endpoint: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_embedding_deployment")]
    #[validate(length(min = 1))]
    pub deployment: String,

    #[serde(default = "default_openai_api_version")]
    pub api_version: String,

    #[serde(default = "default_embedding_dimension")]
    #[validate(range(min = 1, max = 65536))]
    pub dimension: usize,

    #[serde(default = "default_timeout_seconds")]
    #[validate(range(min = 1, max = 300))]
    pub timeout_seconds: u64
}

fn default_embedding_deployment() -> String {
    "foundational-ada".to_string()
}

fn default_openai_api_version() -> String {
    "2023-05-15".to_string()
}

fn default_embedding_dimension() -> usize {
    1536
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            deployment: default_embedding_deployment(),
            api_version: default_openai_api_version(),
            dimension: default_embedding_dimension(),
            timeout_seconds: default_timeout_seconds()
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    #[validate(custom(function = "validate_log_level"))]
    pub log_level: String,

    #[serde(default = "default_log_format")]
    #[validate(custom(function = "validate_log_format"))]
    pub log_format: String
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn validate_log_level(value: &str) -> Result<(), validator::ValidationError> {
    match value {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(validator::ValidationError::new("Invalid log level"))
    }
}

fn validate_log_format(value: &str) -> Result<(), validator::ValidationError> {
    match value {
        "text" | "json" => Ok(()),
        _ => Err(validator::ValidationError::new("Invalid log format"))
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format()
        }
    }
}
