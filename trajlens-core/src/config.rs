//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/trajlens/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/trajlens/` (~/.config/trajlens/)
//! - State/Logs: `$XDG_STATE_HOME/trajlens/` (~/.local/state/trajlens/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Log store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Aggregation configuration
    #[serde(default)]
    pub aggregate: AggregateConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Log store configuration
#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    /// Directory containing the `*.log` evaluation transcripts
    #[serde(default = "default_store_root")]
    pub root: PathBuf,

    /// Timeout for a single log fetch, in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: default_store_root(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl StoreConfig {
    pub fn fetch_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.fetch_timeout_secs)
    }
}

fn default_store_root() -> PathBuf {
    PathBuf::from("logs")
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

/// Aggregation configuration
#[derive(Debug, Deserialize)]
pub struct AggregateConfig {
    /// How many logs are fetched and parsed concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    8
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/trajlens/config.toml` (~/.config/trajlens/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("trajlens").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/trajlens/` (~/.local/state/trajlens/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("trajlens")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/trajlens/trajlens.log` (~/.local/state/trajlens/trajlens.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("trajlens.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.store.root, PathBuf::from("logs"));
        assert_eq!(config.store.fetch_timeout_secs, 10);
        assert_eq!(config.aggregate.concurrency, 8);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[store]
root = "/srv/eval-logs"
fetch_timeout_secs = 30

[aggregate]
concurrency = 16

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.store.root, PathBuf::from("/srv/eval-logs"));
        assert_eq!(config.store.fetch_timeout_secs, 30);
        assert_eq!(config.aggregate.concurrency, 16);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml = r#"
[store]
root = "/data/logs"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.store.fetch_timeout_secs, 10);
        assert_eq!(config.aggregate.concurrency, 8);
    }

    #[test]
    fn test_load_from_missing_file_is_config_error() {
        let path = PathBuf::from("/nonexistent/trajlens-config.toml");
        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
