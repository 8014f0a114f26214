//! Configuration loading and config file resolution
//!
//! Bootstrap configuration lives in a single TOML file. Every field has a
//! built-in default, so a missing file is never fatal.
//!
//! # Resolution Priority
//!
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`MEDFEED_CONFIG`)
//! 3. Per-user config file (`<config dir>/medfeed/medfeed.toml`)
//! 4. Compiled defaults (fallback)
//!
//! After the file is loaded, `MEDFEED_API_URL` and `MEDFEED_TOKEN` override the
//! corresponding fields.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "MEDFEED_CONFIG";
/// Environment variable overriding `api_base_url`
pub const API_URL_ENV_VAR: &str = "MEDFEED_API_URL";
/// Environment variable overriding `auth_token`
pub const TOKEN_ENV_VAR: &str = "MEDFEED_TOKEN";

const CONFIG_DIR_NAME: &str = "medfeed";
const CONFIG_FILE_NAME: &str = "medfeed.toml";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Base URL of the feed/summary backend (no trailing slash required)
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Bearer token forwarded on every request (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Feed and enrichment pipeline tuning
    #[serde(default)]
    pub feed: FeedSettings,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Feed loading and enrichment tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSettings {
    /// Number of articles requested per feed load
    #[serde(default = "default_k")]
    pub k: u32,

    /// Delay between consecutive enrichment dispatches in a batch
    #[serde(default = "default_stagger_ms")]
    pub stagger_ms: u64,

    /// Upper bound for a single enrichment fetch; exceeding it counts as a failure
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// EventBus channel capacity
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

fn default_api_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_k() -> u32 {
    3
}

fn default_stagger_ms() -> u64 {
    100
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

fn default_event_capacity() -> usize {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            auth_token: None,
            feed: FeedSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            k: default_k(),
            stagger_ms: default_stagger_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl FeedSettings {
    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl TomlConfig {
    /// Reject values the client cannot run with
    pub fn validate(&self) -> Result<()> {
        let url = self.api_base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "api_base_url must start with http:// or https://, got '{}'",
                self.api_base_url
            )));
        }
        if self.feed.k == 0 {
            return Err(Error::Config("feed.k must be at least 1".to_string()));
        }
        if self.feed.request_timeout_ms == 0 {
            return Err(Error::Config(
                "feed.request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.feed.event_capacity == 0 {
            return Err(Error::Config(
                "feed.event_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply `MEDFEED_API_URL` / `MEDFEED_TOKEN` on top of file values
    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = non_empty_env(API_URL_ENV_VAR) {
            debug!("api_base_url overridden by {}", API_URL_ENV_VAR);
            self.api_base_url = url;
        }
        if let Some(token) = non_empty_env(TOKEN_ENV_VAR) {
            debug!("auth_token overridden by {}", TOKEN_ENV_VAR);
            self.auth_token = Some(token);
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolves which config file to use and loads it
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Config file path following the resolution priority, if any applies
    pub fn resolve_path(&self) -> Option<PathBuf> {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_path {
            return Some(path.clone());
        }

        // Priority 2: Environment variable
        if let Some(path) = non_empty_env(CONFIG_ENV_VAR) {
            return Some(PathBuf::from(path));
        }

        // Priority 3: Per-user config file, only when it exists
        default_config_path().filter(|p| p.exists())
    }

    /// Load the resolved config, falling back to defaults when no file exists
    ///
    /// A file that exists but does not parse is an error; a missing file is a
    /// warning.
    pub fn load(&self) -> Result<TomlConfig> {
        let mut config = match self.resolve_path() {
            Some(path) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                load_toml_config(&path)?
            }
            Some(path) => {
                warn!(
                    "Config file {} not found, using built-in defaults",
                    path.display()
                );
                TomlConfig::default()
            }
            None => {
                debug!("No config file found, using built-in defaults");
                TomlConfig::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}

/// Default per-user config file location for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    Ok(config)
}

/// Write config to disk (temp file + rename, so readers never see a partial file)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let content = toml::to_string_pretty(config)?;
    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Standard User-Agent for outgoing HTTP requests
pub fn get_user_agent() -> String {
    format!("medfeed/{}", env!("CARGO_PKG_VERSION"))
}
