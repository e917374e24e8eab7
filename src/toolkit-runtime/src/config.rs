//! Runtime configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Result, ToolkitError};

/// Stylesheet bundled with the runtime and injected once the host is ready.
pub const DEFAULT_GLOBAL_CSS: &str = include_str!("../assets/toolkit.css");

/// Runtime tuning knobs. Every field has a default, so an empty file is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolkitConfig {
    /// Delay between host readiness checks (in milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Give up waiting for the host after this many checks (unbounded if unset)
    #[serde(default)]
    pub max_poll_attempts: Option<u32>,

    /// Delay before replaying hooks over already-rendered components (in milliseconds)
    #[serde(default = "default_hook_replay_delay_ms")]
    pub hook_replay_delay_ms: u64,

    /// Option name of the master "disable everything" switch
    #[serde(default = "default_disable_switch")]
    pub disable_switch: String,

    /// Global stylesheet text
    #[serde(default = "default_global_css")]
    pub global_css: String,

    /// Element id of the global stylesheet
    #[serde(default = "default_global_style_id")]
    pub global_style_id: String,

    /// Prefix of per-feature stylesheet element ids
    #[serde(default = "default_style_id_prefix")]
    pub style_id_prefix: String,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_attempts: None,
            hook_replay_delay_ms: default_hook_replay_delay_ms(),
            disable_switch: default_disable_switch(),
            global_css: default_global_css(),
            global_style_id: default_global_style_id(),
            style_id_prefix: default_style_id_prefix(),
        }
    }
}

impl ToolkitConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Build the default configuration overlaid with `TOOLKIT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("TOOLKIT_POLL_INTERVAL_MS") {
            config.poll_interval_ms = parse_env("TOOLKIT_POLL_INTERVAL_MS", &value)?;
        }

        if let Ok(value) = std::env::var("TOOLKIT_MAX_POLL_ATTEMPTS") {
            config.max_poll_attempts = Some(parse_env("TOOLKIT_MAX_POLL_ATTEMPTS", &value)?);
        }

        if let Ok(value) = std::env::var("TOOLKIT_HOOK_REPLAY_DELAY_MS") {
            config.hook_replay_delay_ms = parse_env("TOOLKIT_HOOK_REPLAY_DELAY_MS", &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(ToolkitError::ConfigError(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_poll_attempts == Some(0) {
            return Err(ToolkitError::ConfigError(
                "max_poll_attempts must be greater than zero when set".to_string(),
            ));
        }
        if self.disable_switch.is_empty() {
            return Err(ToolkitError::ConfigError(
                "disable_switch must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn hook_replay_delay(&self) -> Duration {
        Duration::from_millis(self.hook_replay_delay_ms)
    }

    /// Stylesheet element id for a feature.
    pub fn feature_style_id(&self, feature: &str) -> String {
        format!("{}{}", self.style_id_prefix, feature)
    }
}

/// Default location of the configuration file.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("toolkit").join("toolkit.toml"))
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ToolkitError::ConfigError(format!("invalid value for {name}: {value}")))
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_hook_replay_delay_ms() -> u64 {
    100
}

fn default_disable_switch() -> String {
    "DisableToolkit".to_string()
}

fn default_global_css() -> String {
    DEFAULT_GLOBAL_CSS.to_string()
}

fn default_global_style_id() -> String {
    "tk-global-styles".to_string()
}

fn default_style_id_prefix() -> String {
    "tk-feature-styles-".to_string()
}
