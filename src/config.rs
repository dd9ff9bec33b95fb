//! Database configuration
//!
//! Configuration is a JSON object. Every field is optional:
//!
//! ```json
//! {
//!     "log_level": "warn",
//!     "transaction_timeout_ms": 5000,
//!     "max_sort_documents": 100000,
//!     "metrics_enabled": true
//! }
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::{log_event_with_fields, Event, Logger, Severity};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Minimum log severity: trace, info, warn, error or fatal
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Default deadline for every transaction
    #[serde(default)]
    pub transaction_timeout_ms: Option<u64>,

    /// Upper bound on documents buffered by an in-memory ORDER BY
    #[serde(default = "default_max_sort_documents")]
    pub max_sort_documents: usize,

    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "warn".to_string()
}
fn default_max_sort_documents() -> usize {
    100_000
}
fn default_metrics_enabled() -> bool {
    true
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            transaction_timeout_ms: None,
            max_sort_documents: default_max_sort_documents(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl DatabaseConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_json_str(&content)?;
        let path_str = path.to_string_lossy();
        log_event_with_fields(
            Event::ConfigLoaded,
            &[
                ("path", path_str.as_ref()),
                ("log_level", config.log_level.as_str()),
            ],
        );
        Ok(config)
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        let config: DatabaseConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if Severity::parse(&self.log_level).is_none() {
            return Err(ConfigError::Invalid(format!(
                "log_level must be one of trace, info, warn, error, fatal; got '{}'",
                self.log_level
            )));
        }

        if self.max_sort_documents == 0 {
            return Err(ConfigError::Invalid(
                "max_sort_documents must be > 0".to_string(),
            ));
        }

        if self.transaction_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "transaction_timeout_ms must be > 0 when set".to_string(),
            ));
        }

        Ok(())
    }

    pub fn transaction_timeout(&self) -> Option<Duration> {
        self.transaction_timeout_ms.map(Duration::from_millis)
    }

    /// Applies the configured log level to the process-wide logger
    pub fn apply_log_level(&self) {
        if let Some(severity) = Severity::parse(&self.log_level) {
            Logger::set_min_severity(severity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_config_defaults() {
        let config = DatabaseConfig::from_json_str("{}").unwrap();
        assert_eq!(config, DatabaseConfig::default());
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.max_sort_documents, 100_000);
        assert!(config.metrics_enabled);
        assert!(config.transaction_timeout().is_none());
    }

    #[test]
    fn test_config_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("aerodoc.json");
        let body = json!({
            "log_level": "info",
            "transaction_timeout_ms": 250,
            "max_sort_documents": 10
        });
        fs::write(&path, body.to_string()).unwrap();

        let config = DatabaseConfig::load(&path).unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.transaction_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.max_sort_documents, 10);
    }

    #[test]
    fn test_config_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = DatabaseConfig::load(&temp_dir.path().join("missing.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_config_rejects_bad_values() {
        assert!(matches!(
            DatabaseConfig::from_json_str(r#"{"log_level": "loud"}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            DatabaseConfig::from_json_str(r#"{"max_sort_documents": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            DatabaseConfig::from_json_str(r#"{"transaction_timeout_ms": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_config_rejects_unknown_fields() {
        assert!(matches!(
            DatabaseConfig::from_json_str(r#"{"data_dir": "/tmp"}"#),
            Err(ConfigError::Parse(_))
        ));
    }
}
