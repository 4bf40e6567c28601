use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::Validate;

use crate::converter::DEFAULT_MAX_FETCH_DEPTH;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Missing environment variable {0}")]
    MissingEnv(String),
}

/// Pipeline configuration with validation
#[derive(Clone, Debug, PartialEq, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Deepest association path that eager fetching may join
    #[validate(range(min = 1, max = 32, message = "Max fetch depth must be between 1 and 32"))]
    pub max_fetch_depth: usize,

    /// Whether prepared statements are memoised
    pub statement_cache_enabled: bool,

    #[validate(range(
        min = 1,
        max = 100000,
        message = "Statement cache size must be between 1 and 100000"
    ))]
    pub statement_cache_max_entries: usize,

    /// Collapse duplicate root entities produced by collection fetch joins
    pub unique_entity_results: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_fetch_depth: DEFAULT_MAX_FETCH_DEPTH,
            statement_cache_enabled: true,
            statement_cache_max_entries: 512,
            unique_entity_results: true,
        }
    }
}

impl PipelineConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            max_fetch_depth: parse_env_var("RELGRAPH_MAX_FETCH_DEPTH", "5")?,
            statement_cache_enabled: parse_env_var("RELGRAPH_STATEMENT_CACHE_ENABLED", "true")?,
            statement_cache_max_entries: parse_env_var("RELGRAPH_STATEMENT_CACHE_MAX_ENTRIES", "512")?,
            unique_entity_results: parse_env_var("RELGRAPH_UNIQUE_ENTITY_RESULTS", "true")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides on top of `base`
    pub fn from_cli(base: Self, cli: CliConfig) -> Result<Self, ConfigError> {
        let mut config = base;
        if let Some(depth) = cli.max_fetch_depth {
            config.max_fetch_depth = depth;
        }
        if cli.no_statement_cache {
            config.statement_cache_enabled = false;
        }

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from YAML file; missing keys take their defaults
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })?;

        config.validate()?;
        Ok(config)
    }
}

/// CLI overrides (parsed from command line arguments)
#[derive(Clone, Debug, Default)]
pub struct CliConfig {
    pub max_fetch_depth: Option<usize>,
    pub no_statement_cache: bool,
}

/// Connection settings for the ClickHouse store
#[derive(Clone, Debug, PartialEq)]
pub struct ClickHouseSettings {
    pub url: String,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl ClickHouseSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: required_env_var("CLICKHOUSE_URL")?,
            user: required_env_var("CLICKHOUSE_USER")?,
            password: required_env_var("CLICKHOUSE_PASSWORD")?,
            database: required_env_var("CLICKHOUSE_DATABASE")?,
        })
    }
}

fn required_env_var(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingEnv(key.to_string()))
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_fetch_depth, 5);
        assert_eq!(config.statement_cache_max_entries, 512);
        assert!(config.statement_cache_enabled);
        assert!(config.unique_entity_results);
    }

    #[test]
    fn test_invalid_fetch_depth() {
        let config = PipelineConfig {
            max_fetch_depth: 0, // Invalid
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = PipelineConfig {
            max_fetch_depth: 33,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let config = PipelineConfig::from_cli(
            PipelineConfig::default(),
            CliConfig {
                max_fetch_depth: Some(2),
                no_statement_cache: true,
            },
        )
        .unwrap();
        assert_eq!(config.max_fetch_depth, 2);
        assert!(!config.statement_cache_enabled);

        let err = PipelineConfig::from_cli(
            PipelineConfig::default(),
            CliConfig {
                max_fetch_depth: Some(100),
                no_statement_cache: false,
            },
        );
        assert!(matches!(err, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_yaml_file_with_partial_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_fetch_depth: 3\nunique_entity_results: false").unwrap();
        let config = PipelineConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.max_fetch_depth, 3);
        assert!(!config.unique_entity_results);
        assert_eq!(config.statement_cache_max_entries, 512);
    }

    #[test]
    #[serial]
    fn test_from_env() {
        std::env::set_var("RELGRAPH_MAX_FETCH_DEPTH", "7");
        std::env::set_var("RELGRAPH_STATEMENT_CACHE_ENABLED", "false");
        let config = PipelineConfig::from_env();
        std::env::remove_var("RELGRAPH_MAX_FETCH_DEPTH");
        std::env::remove_var("RELGRAPH_STATEMENT_CACHE_ENABLED");
        let config = config.unwrap();
        assert_eq!(config.max_fetch_depth, 7);
        assert!(!config.statement_cache_enabled);
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_garbage() {
        std::env::set_var("RELGRAPH_STATEMENT_CACHE_MAX_ENTRIES", "lots");
        let result = PipelineConfig::from_env();
        std::env::remove_var("RELGRAPH_STATEMENT_CACHE_MAX_ENTRIES");
        assert!(matches!(result, Err(ConfigError::Parse { ref field, .. }) if field == "RELGRAPH_STATEMENT_CACHE_MAX_ENTRIES"));
    }

    #[test]
    #[serial]
    fn test_clickhouse_settings_require_all_variables() {
        std::env::remove_var("CLICKHOUSE_URL");
        let result = ClickHouseSettings::from_env();
        assert!(matches!(result, Err(ConfigError::MissingEnv(ref key)) if key == "CLICKHOUSE_URL"));
    }
}
