//! Engine configuration
//!
//! Loaded from a JSON file. Every field has a default, so `{}` is a valid
//! configuration; a missing file is an error rather than a silent default.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::builder::DEFAULT_SEARCH_LANGUAGE;
use crate::http_server::HttpServerConfig;
use crate::observability::Severity;
use crate::query::MAX_PAGE_SIZE;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config '{path}': {reason}")]
    Read { path: String, reason: String },

    #[error("Malformed config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "AERO_CONFIG_READ_FAILED",
            ConfigError::Parse(_) => "AERO_CONFIG_MALFORMED",
            ConfigError::Invalid(_) => "AERO_CONFIG_INVALID",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on page size and limit
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u64,

    /// Depth bound for nested population; 1 disables recursion
    #[serde(default = "default_max_populate_depth")]
    pub max_populate_depth: usize,

    /// Text-search configuration passed to the store
    #[serde(default = "default_search_language")]
    pub search_language: String,

    #[serde(default = "default_highlight_pre_tag")]
    pub highlight_pre_tag: String,

    #[serde(default = "default_highlight_post_tag")]
    pub highlight_post_tag: String,

    /// Highlight snippets longer than this are cut around the first match
    #[serde(default = "default_snippet_length")]
    pub snippet_length: usize,

    #[serde(default = "default_suggest_limit")]
    pub suggest_limit: u64,

    /// Default and maximum number of time-series buckets
    #[serde(default = "default_time_series_days")]
    pub time_series_days: u64,

    /// Window for the "recently updated" statistic
    #[serde(default = "default_recent_window_days")]
    pub recent_window_days: i64,

    /// Minimum log severity: trace, info, warn, error, or fatal
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub http: HttpServerConfig,
}

fn default_max_page_size() -> u64 {
    MAX_PAGE_SIZE
}

fn default_max_populate_depth() -> usize {
    3
}

fn default_search_language() -> String {
    DEFAULT_SEARCH_LANGUAGE.to_string()
}

fn default_highlight_pre_tag() -> String {
    "<mark>".to_string()
}

fn default_highlight_post_tag() -> String {
    "</mark>".to_string()
}

fn default_snippet_length() -> usize {
    200
}

fn default_suggest_limit() -> u64 {
    10
}

fn default_time_series_days() -> u64 {
    30
}

fn default_recent_window_days() -> i64 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_page_size: default_max_page_size(),
            max_populate_depth: default_max_populate_depth(),
            search_language: default_search_language(),
            highlight_pre_tag: default_highlight_pre_tag(),
            highlight_post_tag: default_highlight_post_tag(),
            snippet_length: default_snippet_length(),
            suggest_limit: default_suggest_limit(),
            time_series_days: default_time_series_days(),
            recent_window_days: default_recent_window_days(),
            log_level: default_log_level(),
            http: HttpServerConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Reads and validates a JSON config file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let raw = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> ConfigResult<Self> {
        let config: EngineConfig = serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_page_size == 0 {
            return Err(ConfigError::Invalid("max_page_size must be at least 1".into()));
        }
        if self.max_populate_depth == 0 {
            return Err(ConfigError::Invalid("max_populate_depth must be at least 1".into()));
        }
        if self.snippet_length == 0 {
            return Err(ConfigError::Invalid("snippet_length must be at least 1".into()));
        }
        if Severity::parse(&self.log_level).is_none() {
            return Err(ConfigError::Invalid(format!("unknown log_level '{}'", self.log_level)));
        }
        if self.search_language.trim().is_empty() {
            return Err(ConfigError::Invalid("search_language must not be empty".into()));
        }
        Ok(())
    }

    /// Configured minimum log severity
    pub fn log_severity(&self) -> Severity {
        Severity::parse(&self.log_level).unwrap_or(Severity::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.max_page_size, 100);
        assert_eq!(config.max_populate_depth, 3);
        assert_eq!(config.highlight_pre_tag, "<mark>");
        assert_eq!(config.time_series_days, 30);
        assert_eq!(config.log_severity(), Severity::Info);
    }

    #[test]
    fn test_load_file_overrides() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"max_page_size": 50, "search_language": "simple", "http": {{"port": 8080}}}}"#
        )
        .unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.max_page_size, 50);
        assert_eq!(config.search_language, "simple");
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.snippet_length, 200);
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = EngineConfig::load(Path::new("/nonexistent/aeroquery.json")).unwrap_err();
        assert_eq!(err.code(), "AERO_CONFIG_READ_FAILED");
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"max_page_size": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"log_level": "loud"}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
