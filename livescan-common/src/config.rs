//! Bootstrap configuration loading
//!
//! The TOML file is optional. Resolution order for its location:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`LIVESCAN_CONFIG`)
//! 3. Per-user config directory (`<config_dir>/livescan/agent.toml`)
//!
//! A missing file is not an error: a warning is logged and compiled defaults
//! are used. A file that exists but fails to parse IS an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "LIVESCAN_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub matching: MatchingConfig,

    #[serde(default)]
    pub repository: RepositoryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Capture loop and enrollment timing
///
/// `quality_threshold`, `capture_timeout_secs` and `fog_removal` are only the
/// startup values; `/api/config` changes the live session copy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptureConfig {
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: i32,

    #[serde(default = "default_capture_timeout_secs")]
    pub capture_timeout_secs: u64,

    #[serde(default)]
    pub fog_removal: bool,

    /// Delay between the first frame above threshold and the end of the loop
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Sleep between two frame acquisitions
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Pause between two enrollment phases
    #[serde(default = "default_phase_pause_ms")]
    pub phase_pause_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            quality_threshold: default_quality_threshold(),
            capture_timeout_secs: default_capture_timeout_secs(),
            fog_removal: false,
            settle_delay_ms: default_settle_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            phase_pause_ms: default_phase_pause_ms(),
        }
    }
}

/// Score thresholds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchingConfig {
    /// 1:1 verification: `score >= verification_threshold` is a match
    #[serde(default = "default_verification_threshold")]
    pub verification_threshold: i32,

    /// 1:N identification: `score > identification_threshold` is a match
    #[serde(default = "default_identification_threshold")]
    pub identification_threshold: i32,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            verification_threshold: default_verification_threshold(),
            identification_threshold: default_identification_threshold(),
        }
    }
}

/// Remote template repository
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepositoryConfig {
    #[serde(default = "default_repository_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            base_url: default_repository_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_quality_threshold() -> i32 {
    40
}

fn default_capture_timeout_secs() -> u64 {
    15
}

fn default_settle_delay_ms() -> u64 {
    2000
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_phase_pause_ms() -> u64 {
    4000
}

fn default_verification_threshold() -> i32 {
    45
}

fn default_identification_threshold() -> i32 {
    55
}

fn default_repository_url() -> String {
    "http://localhost:3000/api".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Per-user default config file location (`<config_dir>/livescan/agent.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("livescan").join("agent.toml"))
}

/// Resolve which config file to read
///
/// Returns `None` when no candidate is known (e.g. no config dir on this
/// platform). The returned path is not guaranteed to exist.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: per-user default
    default_config_path()
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Load the config file if present, otherwise fall back to defaults
pub fn load_or_default(path: Option<&Path>) -> Result<TomlConfig> {
    match path {
        Some(path) if path.exists() => {
            let config = load_toml_config(path)?;
            info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        Some(path) => {
            warn!(
                "Config file {} not found, using built-in defaults",
                path.display()
            );
            Ok(TomlConfig::default())
        }
        None => {
            warn!("No config file location available, using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}
