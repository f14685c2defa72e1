//! # Configuration System
//!
//! Centralized configuration management for Tierguard.
//!
//! This crate provides:
//! - Configuration structures for the content source, tiers, ingestion,
//!   search and embedding
//! - Environment variable loading (12-factor app principles)
//! - Configuration file loading (TOML/YAML)
//! - Configuration precedence (env > file > defaults)
//! - Configuration validation, including tier policy consistency

pub mod config;
pub mod file_loader;
pub mod loader;
pub mod precedence;
pub mod validation;

pub use config::{
    EmbeddingConfig, GraphSourceConfig, IngestionConfig, ObservabilityConfig, RetryConfig,
    SearchConfig, TierConfig, TierguardConfig
};
pub use file_loader::{ConfigFileError, load_from_file, load_from_toml, load_from_yaml};
pub use loader::load_from_env;
pub use precedence::merge_env_over_file;
pub use validation::{missing_for_ingestion, validate};
