//! Configuration file parsing
//!
//! Parses the optional TOML configuration file. Command-line flags are
//! applied on top of the parsed values before `validate` is called.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::server::DEFAULT_BODY_LIMIT;
use crate::store::MAX_PASTE_SIZE;

/// Default listening port
pub const DEFAULT_PORT: u16 = 9001;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Paste database settings
    #[serde(default)]
    pub store: StoreConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address. Empty means all interfaces.
    pub addr: String,

    /// Bind port
    pub port: u16,

    /// Log level (trace, debug, info, warn, error, off)
    pub log_level: String,

    /// Largest accepted request body in bytes
    pub body_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: String::new(),
            port: DEFAULT_PORT,
            log_level: "info".to_string(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl ServerConfig {
    /// `host:port` string to bind. An empty address binds every interface.
    pub fn bind_addr(&self) -> String {
        let host = if self.addr.is_empty() {
            "0.0.0.0"
        } else {
            self.addr.as_str()
        };
        if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, self.port)
        } else {
            format!("{}:{}", host, self.port)
        }
    }
}

/// Paste database settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database location. Required, either here or on the command line.
    pub path: Option<PathBuf>,

    /// How long to wait for another process to release the database lock
    pub open_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            open_timeout_ms: 1000,
        }
    }
}

impl StoreConfig {
    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.store.path {
            Some(path) if !path.as_os_str().is_empty() => {}
            _ => {
                return Err(ConfigError::Invalid(
                    "a database path is required (--db or [store] path)".to_string(),
                ))
            }
        }

        if self.server.port == 0 {
            return Err(ConfigError::Invalid("port must be non-zero".to_string()));
        }

        if self.server.body_limit < MAX_PASTE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "body_limit {} is smaller than the maximum paste size {}",
                self.server.body_limit, MAX_PASTE_SIZE
            )));
        }

        if self.store.open_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "open_timeout_ms must be non-zero".to_string(),
            ));
        }

        if log::LevelFilter::from_str(&self.server.log_level).is_err() {
            return Err(ConfigError::Invalid(format!(
                "unknown log level '{}'",
                self.server.log_level
            )));
        }

        Ok(())
    }
}
