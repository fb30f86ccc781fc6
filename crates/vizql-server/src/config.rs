//! Configuration system for the VizQL server
//!
//! Loads configuration from:
//! 1. config.yaml - operational settings (port, database, logging)
//! 2. .env file - secrets and local overrides
//!
//! Environment variables always override config.yaml values.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// DuckDB database file; an in-memory database when unset.
    #[serde(default)]
    pub path: Option<String>,

    pub pool_size: usize,

    /// How long a caller may wait for a pooled connection.
    pub acquire_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            pool_size: 10,
            acquire_timeout_ms: 10_000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or module-specific
    pub level: String,

    /// Output format: pretty, json, compact
    pub format: String,

    /// Output destination: stdout, file, both
    pub output: String,

    /// Directory for log files
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            output: "stdout".to_string(),
            directory: "./logs".to_string(),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file with environment variable
    /// overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Like `load`, but a missing file falls back to defaults (still with
    /// env overrides applied).
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            let mut config = Config::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("VIZQL_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("VIZQL_SERVER_PORT") {
            if let Ok(port_num) = port.parse() {
                self.server.port = port_num;
            }
        }

        if let Ok(path) = std::env::var("VIZQL_DB_PATH") {
            self.database.path = if path.is_empty() { None } else { Some(path) };
        }
        if let Ok(size) = std::env::var("VIZQL_DB_POOL_SIZE") {
            if let Ok(size_num) = size.parse() {
                self.database.pool_size = size_num;
            }
        }
        if let Ok(timeout) = std::env::var("VIZQL_DB_ACQUIRE_TIMEOUT_MS") {
            if let Ok(timeout_num) = timeout.parse() {
                self.database.acquire_timeout_ms = timeout_num;
            }
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(output) = std::env::var("LOG_OUTPUT") {
            self.logging.output = output;
        }
        if let Ok(dir) = std::env::var("LOG_DIR") {
            self.logging.directory = dir;
        }
    }

    /// Set logging environment variables for the logging module
    pub fn apply_logging_env(&self) {
        std::env::set_var("RUST_LOG", &self.logging.level);
        std::env::set_var("LOG_FORMAT", &self.logging.format);
        std::env::set_var("LOG_OUTPUT", &self.logging.output);
        std::env::set_var("LOG_DIR", &self.logging.directory);
    }
}
