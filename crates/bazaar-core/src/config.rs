//! Configuration management for Bazaar.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration.
///
/// This is loaded from `~/.config/bazaar/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Fan-out behaviour
    pub search: SearchConfig,
    /// Rate limiting and retry behaviour
    pub governor: GovernorConfig,
    /// Market intelligence tuning
    pub intelligence: IntelligenceConfig,
    /// Where source definitions live
    pub sources: SourcesConfig,
    /// Credential lookup settings
    pub credentials: CredentialsConfig,
    /// HTTP server settings
    pub server: ServerConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path, falling back to defaults if
    /// the file does not exist.
    pub fn load_from(config_path: &Path) -> ConfigResult<Self> {
        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(config_path)?;
            let config: Self = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `BAZAAR_MAX_CONCURRENCY`: Override the per-request concurrency ceiling
    /// - `BAZAAR_SOURCE_TIMEOUT_MS`: Override the default per-source timeout
    /// - `BAZAAR_SOURCES_DIR`: Override the source definitions directory
    /// - `BAZAAR_BIND_ADDR`: Override the HTTP bind address
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production, a map in tests).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("BAZAAR_MAX_CONCURRENCY") {
            if let Ok(max) = val.parse() {
                self.search.max_concurrency = max;
                tracing::debug!("Override search.max_concurrency from env: {}", max);
            }
        }

        if let Some(val) = lookup("BAZAAR_SOURCE_TIMEOUT_MS") {
            if let Ok(ms) = val.parse() {
                self.search.default_timeout_ms = ms;
                tracing::debug!("Override search.default_timeout_ms from env: {}", ms);
            }
        }

        if let Some(val) = lookup("BAZAAR_SOURCES_DIR") {
            tracing::debug!("Override sources.definitions_dir from env: {}", val);
            self.sources.definitions_dir = Some(PathBuf::from(val));
        }

        if let Some(val) = lookup("BAZAAR_BIND_ADDR") {
            tracing::debug!("Override server.bind_addr from env: {}", val);
            self.server.bind_addr = val;
        }
    }

    /// Check values that would make the engine misbehave.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.search.max_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "search.max_concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.search.default_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "search.default_timeout_ms".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.search.user_agent.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "search.user_agent".to_string(),
                reason: "an explicit client identity is required".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.intelligence.similarity_threshold) {
            return Err(ConfigError::InvalidValue {
                field: "intelligence.similarity_threshold".to_string(),
                reason: format!(
                    "must be between 0.0 and 1.0, got {}",
                    self.intelligence.similarity_threshold
                ),
            });
        }
        if self.governor.rate_limit_multiplier == 0 {
            return Err(ConfigError::InvalidValue {
                field: "governor.rate_limit_multiplier".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/bazaar/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "bazaar", "bazaar").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

/// Fan-out behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Simultaneous outbound calls per request
    pub max_concurrency: usize,
    /// Per-source timeout when a definition declares none
    pub default_timeout_ms: u64,
    /// Overall cap on a request's wall-clock time (0 = none)
    pub request_deadline_ms: u64,
    /// Per-source result cap when the request sets none
    pub max_results_per_source: usize,
    /// Client identity sent with every outbound request
    pub user_agent: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            default_timeout_ms: 10_000,
            request_deadline_ms: 0,
            max_results_per_source: 50,
            user_agent: "Bazaar/0.1.0 (+https://github.com/bazaar-search/bazaar)".to_string(),
        }
    }
}

/// Rate limiting and retry behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    /// Retries after the first attempt, for rate limits and timeouts only
    pub max_retries: u32,
    /// Base backoff delay in milliseconds
    pub base_backoff_ms: u64,
    /// Ceiling for a single backoff delay in milliseconds
    pub max_backoff_ms: u64,
    /// Extra multiplier applied when the failure was a rate limit
    pub rate_limit_multiplier: u32,
    /// Longest time a call may queue for a rate-limit token
    pub max_queue_wait_ms: u64,
    /// Randomize backoff delays to avoid synchronized retries
    pub jitter: bool,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_backoff_ms: 250,
            max_backoff_ms: 4_000,
            rate_limit_multiplier: 3,
            max_queue_wait_ms: 2_000,
            jitter: true,
        }
    }
}

/// Market intelligence tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntelligenceConfig {
    /// Minimum title-token overlap (Jaccard) for two listings to be similar
    pub similarity_threshold: f64,
    /// Title tokens shorter than this are ignored
    pub min_token_len: usize,
}

impl Default for IntelligenceConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.5,
            min_token_len: 2,
        }
    }
}

/// Where source definitions live.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Definitions directory; `source-definitions/` at the workspace root when unset
    pub definitions_dir: Option<PathBuf>,
}

/// Credential lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Prefix of environment variables consulted as the last resolution step
    pub env_prefix: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            env_prefix: "BAZAAR".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.search.max_concurrency, 8);
        assert_eq!(config.search.default_timeout_ms, 10_000);
        assert_eq!(config.governor.max_retries, 2);
        assert!((config.intelligence.similarity_threshold - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.credentials.env_prefix, "BAZAAR");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("[search]"));
        assert!(toml_str.contains("[governor]"));
        assert!(toml_str.contains("[intelligence]"));

        let parsed: AppConfig = toml::from_str(&toml_str).expect("parse serialized config");
        assert_eq!(parsed.search.user_agent, config.search.user_agent);
    }

    #[test]
    fn test_config_load_from_file() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("config.toml");

        let mut config = AppConfig::default();
        config.search.max_concurrency = 12;
        config.governor.jitter = false;

        let contents = toml::to_string_pretty(&config).expect("serialize config");
        fs::write(&config_path, contents).expect("write config file");

        let loaded = AppConfig::load_from(&config_path).expect("load config");
        assert_eq!(loaded.search.max_concurrency, 12);
        assert!(!loaded.governor.jitter);
    }

    #[test]
    fn test_config_load_missing_file_uses_defaults() {
        let tmp = TempDir::new().expect("create temp dir");
        let loaded = AppConfig::load_from(&tmp.path().join("absent.toml")).expect("load config");
        assert_eq!(loaded.search.max_concurrency, 8);
    }

    #[test]
    fn test_config_load_rejects_invalid_values() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("config.toml");
        fs::write(&config_path, "[search]\nmax_concurrency = 0\n").expect("write config file");

        let err = AppConfig::load_from(&config_path).expect_err("zero concurrency is invalid");
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("BAZAAR_MAX_CONCURRENCY", "4"),
            ("BAZAAR_SOURCE_TIMEOUT_MS", "2500"),
            ("BAZAAR_SOURCES_DIR", "/srv/bazaar/sources"),
            ("BAZAAR_BIND_ADDR", "0.0.0.0:9000"),
        ]);

        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| env.get(key).map(ToString::to_string));

        assert_eq!(config.search.max_concurrency, 4);
        assert_eq!(config.search.default_timeout_ms, 2500);
        assert_eq!(
            config.sources.definitions_dir,
            Some(PathBuf::from("/srv/bazaar/sources"))
        );
        assert_eq!(config.server.bind_addr, "0.0.0.0:9000");
    }

    #[test]
    fn test_env_overrides_ignore_garbage() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| {
            (key == "BAZAAR_MAX_CONCURRENCY").then(|| "lots".to_string())
        });
        assert_eq!(config.search.max_concurrency, 8);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[search]
max_concurrency = 10

[intelligence]
similarity_threshold = 0.6
"#;

        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert_eq!(config.search.max_concurrency, 10);
        assert!((config.intelligence.similarity_threshold - 0.6).abs() < f64::EPSILON);
        // These should be defaults
        assert_eq!(config.search.default_timeout_ms, 10_000);
        assert_eq!(config.governor.rate_limit_multiplier, 3);
    }
}
