//! Bootstrap configuration loading
//!
//! Configuration sources, highest priority first:
//! 1. Command-line arguments (applied by each binary on top of the result)
//! 2. Config file named by `--config` or the `DUEL_CONFIG` environment variable
//! 3. Platform config file (`~/.config/codeduel/config.toml`, then `/etc/codeduel/config.toml`)
//! 4. Compiled defaults
//!
//! A missing file is never fatal: the services log a warning and start on
//! defaults. A file that exists but does not parse is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "DUEL_CONFIG";

/// Default duel-hub port
pub const DEFAULT_HUB_PORT: u16 = 5810;

/// Default duel-sc port
pub const DEFAULT_SCORING_PORT: u16 = 5811;

/// Default EventBus capacity
pub const DEFAULT_EVENT_BUS_CAPACITY: usize = 1000;

/// Default interval between eviction sweeps (only used when a TTL is set)
pub const DEFAULT_EVICTION_INTERVAL_SECS: u64 = 60;

/// Bootstrap configuration loaded from TOML
///
/// Every key is optional; absent keys take the compiled default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Interface both services bind to
    pub host: String,

    /// duel-hub HTTP/WebSocket port
    pub hub_port: u16,

    /// duel-sc HTTP port
    pub scoring_port: u16,

    /// Events buffered per EventBus subscriber
    pub event_bus_capacity: usize,

    /// Idle matches older than this are evicted. Unset = matches live for the
    /// whole process lifetime.
    pub match_ttl_secs: Option<u64>,

    /// Seconds between eviction sweeps
    pub eviction_interval_secs: u64,

    /// When set, duel-hub scores ready matches through this duel-sc base URL
    /// instead of inline
    pub scoring_service_url: Option<String>,

    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or EnvFilter directive (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            hub_port: DEFAULT_HUB_PORT,
            scoring_port: DEFAULT_SCORING_PORT,
            event_bus_capacity: DEFAULT_EVENT_BUS_CAPACITY,
            match_ttl_secs: None,
            eviction_interval_secs: DEFAULT_EVICTION_INTERVAL_SECS,
            scoring_service_url: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Parse from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig =
            toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Reject values the services cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.event_bus_capacity == 0 {
            return Err(Error::Config("event_bus_capacity must be at least 1".to_string()));
        }
        if self.match_ttl_secs == Some(0) {
            return Err(Error::Config("match_ttl_secs must be positive when set".to_string()));
        }
        if self.eviction_interval_secs == 0 {
            return Err(Error::Config("eviction_interval_secs must be positive".to_string()));
        }
        if let Some(url) = &self.scoring_service_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::Config(format!(
                    "scoring_service_url must be an http(s) URL, got {:?}",
                    url
                )));
            }
        }
        Ok(())
    }

    /// Eviction TTL, if eviction is enabled
    pub fn match_ttl(&self) -> Option<Duration> {
        self.match_ttl_secs.map(Duration::from_secs)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_secs)
    }
}

/// Locate the config file to load, if any
///
/// An explicit path (CLI, then environment) is returned even when it does
/// not exist, so the caller can warn about it. Platform paths are only
/// returned when present.
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config locations
    let user_config = dirs::config_dir().map(|d| d.join("codeduel").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/codeduel/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Resolve and load the bootstrap configuration
///
/// Missing files fall back to compiled defaults with a warning; unparsable
/// or invalid files are an error.
pub fn load_config(cli_path: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = resolve_config_path(cli_path) else {
        info!("No config file found, using compiled defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        warn!(
            "Config file {} not found, using compiled defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let config = TomlConfig::load(&path)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}
