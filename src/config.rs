//! Configuration parsing and validation.
//!
//! grc-ack is configured with a TOML file (default `./config/grcack.toml`):
//!
//! ```toml
//! [db]
//! path = "./data/grcack.sqlite"
//!
//! [server]
//! bind = "127.0.0.1:7340"
//! expose_error_details = false
//!
//! [stats]
//! default_page_size = 50
//!
//! [log]
//! filter = "grc_ack=info"
//! ```
//!
//! `[stats]` and `[log]` are optional. `RUST_LOG`, when set, takes
//! precedence over `log.filter`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use grc_ack_core::stats::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// Append underlying error text to 500 responses. Development only.
    #[serde(default)]
    pub expose_error_details: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StatsConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
        }
    }
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "grc_ack=info".to_string()
}

impl Config {
    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.server.bind.trim().is_empty() {
            anyhow::bail!("server.bind must not be empty");
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.stats.default_page_size) {
            anyhow::bail!("stats.default_page_size must be in [1, {}]", MAX_PAGE_SIZE);
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    Config::from_toml(&content)
}
