//! # Configuration File Loading
//!
//! Loads configuration from TOML or YAML files.
//!
//! Supports automatic format detection based on file extension.

use crate::config::TierguardConfig;
use std::path::Path;

/// Configuration file loading error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(String),

    #[error("Failed to parse YAML: {0}")]
    YamlParse(String),

    #[error("Config file has no extension")]
    NoExtension,

    #[error("Unsupported config file format: {0}")]
    UnsupportedFormat(String)
}

/// Load configuration from TOML file.
///
/// Sections and fields that are absent keep their defaults.
pub fn load_from_toml(path: &Path) -> Result<TierguardConfig, ConfigFileError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|_e| ConfigFileError::FileNotFound(path.display().to_string()))?;

    toml::from_str(&contents).map_err(|e| ConfigFileError::TomlParse(e.to_string()))
}

/// Load configuration from YAML file.
pub fn load_from_yaml(path: &Path) -> Result<TierguardConfig, ConfigFileError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|_e| ConfigFileError::FileNotFound(path.display().to_string()))?;

    serde_yaml::from_str(&contents).map_err(|e| ConfigFileError::YamlParse(e.to_string()))
}

/// Load configuration from file with auto-detection.
///
/// # M-CANONICAL-DOCS
///
/// ## Supported Formats
/// - `.toml`: TOML format
/// - `.yaml` / `.yml`: YAML format
///
/// ## Usage
/// ```rust,no_run
/// use config::load_from_file;
/// use std::path::Path;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = load_from_file(Path::new("tierguard.toml"))?;
///     println!("Default tier: {}", config.tiers.default_tier);
///     Ok(())
/// }
/// ```
pub fn load_from_file(path: &Path) -> Result<TierguardConfig, ConfigFileError> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or(ConfigFileError::NoExtension)?;

    match extension.to_lowercase().as_str() {
        "toml" => load_from_toml(path),
        "yaml" | "yml" => load_from_yaml(path),
        other => Err(ConfigFileError::UnsupportedFormat(other.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tierguard.toml");

        let toml_content = r#"
[source]
tenant_id = "contoso-tenant"
site_domain = "contoso.sharepoint.com"
site_name = "Finance"

[tiers]
priority = ["Critical", "Medium", "Low"]
default_tier = "Medium"

[tiers.seed_mappings]
"Finance Owners" = "Critical"
"Finance Visitors" = "Low"

[search]
top_k = 10

[observability]
log_format = "json"
"#;
        fs::write(&path, toml_content).unwrap();

        let config = load_from_toml(&path).unwrap();
        assert_eq!(config.source.tenant_id, "contoso-tenant");
        assert_eq!(config.source.site_name, "Finance");
        assert_eq!(config.tiers.priority, vec!["Critical", "Medium", "Low"]);
        assert_eq!(config.tiers.seed_mappings.len(), 2);
        assert_eq!(config.search.top_k, 10);
        assert_eq!(config.search.max_content_chars, 1000);
        assert_eq!(config.observability.log_format, "json");
    }

    #[test]
    fn test_load_from_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tierguard.yaml");

        let yaml_content = r#"
source:
  site_name: Finance
ingestion:
  max_concurrency: 2
  file_formats: [pdf]
tiers:
  default_tier: Group_low
"#;
        fs::write(&path, yaml_content).unwrap();

        let config = load_from_yaml(&path).unwrap();
        assert_eq!(config.source.site_name, "Finance");
        assert_eq!(config.ingestion.max_concurrency, 2);
        assert_eq!(config.ingestion.file_formats, vec!["pdf"]);
        assert_eq!(config.tiers.default_tier, "Group_low");
        assert_eq!(config.tiers.priority.len(), 3);
    }

    #[test]
    fn test_load_from_file_unsupported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tierguard.json");
        fs::write(&path, "{}").unwrap();

        let result = load_from_file(&path);
        assert!(matches!(result, Err(ConfigFileError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_load_from_file_no_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tierguard");
        fs::write(&path, "").unwrap();

        let result = load_from_file(&path);
        assert!(matches!(result, Err(ConfigFileError::NoExtension)));
    }

    #[test]
    fn test_load_from_file_auto_detect_yml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tierguard.yml");
        fs::write(&path, "search:\n  index_name: auto-index\n").unwrap();

        let config = load_from_file(&path).unwrap();
        assert_eq!(config.search.index_name, "auto-index");
    }

    #[test]
    fn test_load_from_toml_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tierguard.toml");
        fs::write(&path, "[invalid\n").unwrap();

        let result = load_from_toml(&path);
        assert!(matches!(result, Err(ConfigFileError::TomlParse(_))));
    }

    #[test]
    fn test_load_from_yaml_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tierguard.yaml");
        fs::write(&path, "invalid: [unmatched\n").unwrap();

        let result = load_from_yaml(&path);
        assert!(matches!(result, Err(ConfigFileError::YamlParse(_))));
    }

    #[test]
    fn test_load_from_toml_not_found() {
        let path = Path::new("/nonexistent/path/tierguard.toml");
        let result = load_from_toml(path);
        assert!(matches!(result, Err(ConfigFileError::FileNotFound(_))));
    }
}
