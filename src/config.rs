use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{GmailError, Result};
use crate::models::MailCategory;

/// Gmail caps a single messages.list page at 500 ids
pub const MAX_SEARCH_RESULTS: u32 = 500;

/// Gmail's batch endpoint accepts at most 100 calls per batch
pub const MAX_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// Ordered label -> category table; the first entry found on a message wins
    #[serde(default = "default_categories")]
    pub categories: Vec<CategoryRule>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            analysis: AnalysisConfig::default(),
            categories: default_categories(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_base_query")]
    pub base_query: String,
    #[serde(default = "default_protected_labels")]
    pub protected_labels: Vec<String>,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_query: default_base_query(),
            protected_labels: default_protected_labels(),
            max_results: default_max_results(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    #[serde(default = "default_sample_count")]
    pub sample_count: usize,
    #[serde(default = "default_top_senders")]
    pub top_senders: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_concurrent_requests: default_max_concurrent(),
            sample_count: default_sample_count(),
            top_senders: default_top_senders(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub label_id: String,
    pub category: MailCategory,
}

impl CategoryRule {
    pub fn new(label_id: &str, category: MailCategory) -> Self {
        Self {
            label_id: label_id.to_string(),
            category,
        }
    }
}

fn default_base_query() -> String {
    "is:unread older_than:1y -is:starred -is:important -in:drafts -in:spam -in:trash".to_string()
}

fn default_protected_labels() -> Vec<String> {
    ["Keep", "Tax", "Receipts", "Legal", "School", "Work", "Banking"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_max_results() -> u32 {
    MAX_SEARCH_RESULTS
}

fn default_batch_size() -> usize {
    MAX_BATCH_SIZE
}

fn default_max_concurrent() -> usize {
    25
}

fn default_sample_count() -> usize {
    20
}

fn default_top_senders() -> usize {
    10
}

fn default_categories() -> Vec<CategoryRule> {
    vec![
        CategoryRule::new("CATEGORY_PROMOTIONS", MailCategory::Promotions),
        CategoryRule::new("CATEGORY_SOCIAL", MailCategory::Social),
        CategoryRule::new("CATEGORY_UPDATES", MailCategory::Updates),
        CategoryRule::new("CATEGORY_FORUMS", MailCategory::Forums),
        CategoryRule::new("CATEGORY_PERSONAL", MailCategory::Personal),
    ]
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        // If file doesn't exist, return default config with warning
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GmailError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| GmailError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                GmailError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| GmailError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| GmailError::ConfigError(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.search.base_query.trim().is_empty() {
            return Err(GmailError::ConfigError(
                "search.base_query cannot be empty".to_string(),
            ));
        }

        if self
            .search
            .protected_labels
            .iter()
            .any(|label| label.trim().is_empty())
        {
            return Err(GmailError::ConfigError(
                "search.protected_labels cannot contain empty strings".to_string(),
            ));
        }

        if self.search.max_results == 0 {
            return Err(GmailError::ConfigError(
                "search.max_results must be at least 1".to_string(),
            ));
        }
        if self.search.max_results > MAX_SEARCH_RESULTS {
            return Err(GmailError::ConfigError(format!(
                "search.max_results cannot exceed {} (one messages.list page)",
                MAX_SEARCH_RESULTS
            )));
        }

        if self.analysis.batch_size == 0 {
            return Err(GmailError::ConfigError(
                "analysis.batch_size must be at least 1".to_string(),
            ));
        }
        if self.analysis.batch_size > MAX_BATCH_SIZE {
            return Err(GmailError::ConfigError(format!(
                "analysis.batch_size cannot exceed {}",
                MAX_BATCH_SIZE
            )));
        }

        // Keep in-flight requests under Gmail's 250 units/sec per-user quota
        if self.analysis.max_concurrent_requests == 0 {
            return Err(GmailError::ConfigError(
                "analysis.max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        if self.analysis.max_concurrent_requests > 50 {
            return Err(GmailError::ConfigError(
                "analysis.max_concurrent_requests cannot exceed 50".to_string(),
            ));
        }

        if self.analysis.sample_count == 0 {
            return Err(GmailError::ConfigError(
                "analysis.sample_count must be greater than 0".to_string(),
            ));
        }
        if self.analysis.top_senders == 0 {
            return Err(GmailError::ConfigError(
                "analysis.top_senders must be greater than 0".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for rule in &self.categories {
            if rule.label_id.trim().is_empty() {
                return Err(GmailError::ConfigError(
                    "categories.label_id cannot be empty".to_string(),
                ));
            }
            if !seen.insert(rule.label_id.as_str()) {
                return Err(GmailError::ConfigError(format!(
                    "categories contains duplicate label_id '{}'",
                    rule.label_id
                )));
            }
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Create an example configuration file
    pub async fn create_example(path: &Path) -> Result<()> {
        let config = Self::default();
        config.save(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.search.base_query.starts_with("is:unread older_than:1y"));
        assert_eq!(config.search.protected_labels.len(), 7);
        assert_eq!(config.search.protected_labels[0], "Keep");
        assert_eq!(config.search.max_results, 500);

        assert_eq!(config.analysis.batch_size, 100);
        assert_eq!(config.analysis.max_concurrent_requests, 25);
        assert_eq!(config.analysis.sample_count, 20);
        assert_eq!(config.analysis.top_senders, 10);

        assert_eq!(config.categories.len(), 5);
        assert_eq!(config.categories[0].label_id, "CATEGORY_PROMOTIONS");
        assert_eq!(config.categories[0].category, MailCategory::Promotions);
    }

    #[test]
    fn test_config_validation_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_empty_base_query() {
        let mut config = Config::default();
        config.search.base_query = "   ".to_string();
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("base_query cannot be empty"));
    }

    #[test]
    fn test_config_validation_empty_protected_label() {
        let mut config = Config::default();
        config.search.protected_labels.push("".to_string());
        let result = config.validate();
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("protected_labels cannot contain empty strings"));
    }

    #[test]
    fn test_config_validation_max_results_bounds() {
        let mut config = Config::default();

        config.search.max_results = 0;
        assert!(config.validate().is_err());

        config.search.max_results = 501;
        assert!(config.validate().unwrap_err().to_string().contains("cannot exceed 500"));

        config.search.max_results = 1;
        assert!(config.validate().is_ok());

        config.search.max_results = 500;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_batch_size_bounds() {
        let mut config = Config::default();

        config.analysis.batch_size = 0;
        assert!(config.validate().unwrap_err().to_string().contains("at least 1"));

        config.analysis.batch_size = 101;
        assert!(config.validate().unwrap_err().to_string().contains("cannot exceed 100"));

        config.analysis.batch_size = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_max_concurrent_bounds() {
        let mut config = Config::default();

        config.analysis.max_concurrent_requests = 0;
        assert!(config.validate().is_err());

        config.analysis.max_concurrent_requests = 51;
        assert!(config.validate().unwrap_err().to_string().contains("cannot exceed 50"));

        config.analysis.max_concurrent_requests = 50;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_report_sizes() {
        let mut config = Config::default();
        config.analysis.sample_count = 0;
        assert!(config.validate().unwrap_err().to_string().contains("sample_count"));

        let mut config = Config::default();
        config.analysis.top_senders = 0;
        assert!(config.validate().unwrap_err().to_string().contains("top_senders"));
    }

    #[test]
    fn test_config_validation_duplicate_category_label() {
        let mut config = Config::default();
        config
            .categories
            .push(CategoryRule::new("CATEGORY_SOCIAL", MailCategory::Forums));
        let result = config.validate();
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("duplicate label_id 'CATEGORY_SOCIAL'"));
    }

    #[tokio::test]
    async fn test_config_load_save_roundtrip() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        let mut config = Config::default();
        config.search.protected_labels = vec!["Keep".to_string(), "Family".to_string()];
        config.save(path).await.unwrap();

        let loaded = Config::load(path).await.unwrap();
        assert_eq!(loaded.search.protected_labels, config.search.protected_labels);
        assert_eq!(loaded.categories, config.categories);
        assert_eq!(loaded.analysis.batch_size, config.analysis.batch_size);
    }

    #[tokio::test]
    async fn test_config_load_nonexistent_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");

        let config = Config::load(&path).await.unwrap();
        assert_eq!(config.search.max_results, 500);
    }

    #[tokio::test]
    async fn test_config_load_invalid_toml() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        tokio::fs::write(path, "this is not valid toml {[}]")
            .await
            .unwrap();

        let result = Config::load(path).await;
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Failed to parse config file"));
    }

    #[tokio::test]
    async fn test_config_partial_with_defaults() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        let partial_config = r#"
[search]
protected_labels = ["Keep", "Family"]

[[categories]]
label_id = "CATEGORY_SOCIAL"
category = "Social"

[[categories]]
label_id = "CATEGORY_PROMOTIONS"
category = "Promotions"
"#;
        tokio::fs::write(path, partial_config).await.unwrap();

        let config = Config::load(path).await.unwrap();

        assert_eq!(config.search.protected_labels, vec!["Keep", "Family"]);
        assert_eq!(config.categories.len(), 2);
        assert_eq!(config.categories[0].category, MailCategory::Social);

        // Untouched sections keep their defaults
        assert_eq!(config.search.max_results, 500);
        assert_eq!(config.analysis.batch_size, 100);
    }

    #[tokio::test]
    async fn test_config_create_example() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        Config::create_example(path).await.unwrap();

        let config = Config::load(path).await.unwrap();
        assert_eq!(config.categories.len(), 5);
    }
}
