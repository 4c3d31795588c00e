//! Runtime configuration for livescan-agent
//!
//! Resolution order: CLI flag (or its environment variable) → TOML file →
//! built-in default. The TOML file itself is located by
//! [`livescan_common::config::resolve_config_path`].

use crate::flows::FlowConfig;
use crate::models::{CaptureSettings, CaptureTiming};
use livescan_common::config::TomlConfig;
use std::time::Duration;

/// Values given on the command line, each overriding the TOML file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub repository_url: Option<String>,
}

/// Fully resolved agent configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub host: String,
    pub port: u16,
    /// Settings the session starts with; `/api/config` changes the session copy only
    pub initial_settings: CaptureSettings,
    pub flow: FlowConfig,
    pub repository_url: String,
    pub repository_timeout: Duration,
    pub log_level: String,
}

impl AgentConfig {
    pub fn resolve(toml: TomlConfig, overrides: ConfigOverrides) -> Self {
        let capture = toml.capture;
        Self {
            host: overrides.host.unwrap_or(toml.server.host),
            port: overrides.port.unwrap_or(toml.server.port),
            initial_settings: CaptureSettings {
                quality_threshold: capture.quality_threshold,
                capture_timeout_secs: capture.capture_timeout_secs,
                fog_removal: capture.fog_removal,
            },
            flow: FlowConfig {
                timing: CaptureTiming {
                    settle_delay: Duration::from_millis(capture.settle_delay_ms),
                    poll_interval: Duration::from_millis(capture.poll_interval_ms),
                    phase_pause: Duration::from_millis(capture.phase_pause_ms),
                },
                verification_threshold: toml.matching.verification_threshold,
                identification_threshold: toml.matching.identification_threshold,
            },
            repository_url: overrides.repository_url.unwrap_or(toml.repository.base_url),
            repository_timeout: Duration::from_secs(toml.repository.request_timeout_secs),
            log_level: toml.logging.level,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::resolve(TomlConfig::default(), ConfigOverrides::default())
    }
}
