//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.subpulse.toml` files.

use crate::cache::CacheConfig;
use crate::dashboard::queries::is_valid_identifier;
use crate::pinot::PinotClientConfig;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".subpulse.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Pinot broker settings.
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Result cache settings.
    #[serde(default)]
    pub cache: CacheSettings,

    /// Dashboard server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// Pinot broker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker base URL.
    #[serde(default = "default_broker_url")]
    pub url: String,

    /// Table holding subscriber events.
    #[serde(default = "default_table")]
    pub table: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: default_broker_url(),
            table: default_table(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_broker_url() -> String {
    "http://localhost:8099".to_string()
}

fn default_table() -> String {
    "topic5".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Result cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Maximum number of cached query results.
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,

    /// Seconds a cached result stays valid.
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            ttl_seconds: default_ttl(),
        }
    }
}

fn default_max_entries() -> u64 {
    256
}

fn default_ttl() -> u64 {
    300
}

/// Dashboard server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8501))
}

impl From<&BrokerConfig> for PinotClientConfig {
    fn from(config: &BrokerConfig) -> Self {
        Self {
            broker_url: config.url.clone(),
            timeout_seconds: config.timeout_seconds,
        }
    }
}

impl From<&CacheSettings> for CacheConfig {
    fn from(config: &CacheSettings) -> Self {
        Self {
            max_entries: config.max_entries,
            ttl_seconds: config.ttl_seconds,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Only explicitly provided values override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.broker_url {
            self.broker.url = url.clone();
        }
        if let Some(ref table) = args.table {
            self.broker.table = table.clone();
        }
        if let Some(timeout) = args.timeout {
            self.broker.timeout_seconds = timeout;
        }

        if let Some(entries) = args.cache_entries {
            self.cache.max_entries = entries;
        }
        if let Some(ttl) = args.cache_ttl {
            self.cache.ttl_seconds = ttl;
        }

        if let Some(bind) = args.bind {
            self.server.bind = bind;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Check the merged settings.
    ///
    /// Runs after [`Config::merge_with_args`] so values from the file get
    /// the same checks as command-line flags.
    pub fn validate(&self) -> Result<()> {
        let url = &self.broker.url;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            bail!("broker.url must start with 'http://' or 'https://': {}", url);
        }

        if !is_valid_identifier(&self.broker.table) {
            bail!("broker.table is not a valid table name: {}", self.broker.table);
        }

        if self.broker.timeout_seconds == 0 {
            bail!("broker.timeout_seconds must be at least 1");
        }

        if self.cache.max_entries == 0 {
            bail!("cache.max_entries must be at least 1");
        }

        if self.cache.ttl_seconds == 0 {
            bail!("cache.ttl_seconds must be at least 1");
        }

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
