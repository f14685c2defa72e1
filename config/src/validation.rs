//! # Configuration Validation
//!
//! Provides validation for all configuration structures using the `validator` crate.

use crate::config::TierguardConfig;
use validator::Validate;

/// Validate configuration structure.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Validates all configuration fields using the `validator` crate, including
/// the cross-field rules on tiers and chunking.
///
/// ## Validation Rules
/// ### Source
/// - `authority_host`, `graph_base_url`: valid URLs
/// - `timeout_seconds`: 1-300
/// - `retry.max_retries`: 0-10
///
/// ### Tiers
/// - `priority`: non-empty, no duplicates
/// - `default_tier` and every seed tier: members of `priority`
///
/// ### Ingestion
/// - `max_concurrency`: 1-64
/// - `chunk_overlap` smaller than `chunk_size`
///
/// ### Observability
/// - `log_level`: "trace", "debug", "info", "warn" or "error"
/// - `log_format`: "text" or "json"
pub fn validate(config: &TierguardConfig) -> Result<(), validator::ValidationErrors> {
    config.validate()
}

/// Settings that must be present before talking to live services.
///
/// Unlike [`validate`], this reports empty credentials and endpoints that
/// are legitimately empty in a default configuration.
pub fn missing_for_ingestion(config: &TierguardConfig) -> Vec<String> {
    let mut missing: Vec<String> = config
        .source
        .missing_credentials()
        .into_iter()
        .map(|f| format!("source.{f}"))
        .collect();

    if config.search.endpoint.is_empty() {
        missing.push("search.endpoint".to_string());
    }
    if config.embedding.endpoint.is_empty() {
        missing.push("embedding.endpoint".to_string());
    }

    missing
}
