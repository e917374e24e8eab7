//! Process-wide toolkit state.
//!
//! The state is created empty with the runtime, filled exactly once by the
//! Bootstrap message and afterwards only changed through setting-change
//! messages. Everything else reads it.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use crate::feature::{FeatureSetting, is_feature_enabled};

/// Release channel the extension was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Beta,
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Beta => write!(f, "beta"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Global configuration carried by the Bootstrap message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapPayload {
    /// Feature settings by feature name
    #[serde(default)]
    pub options: HashMap<String, FeatureSetting>,

    pub environment: Environment,

    /// Extension version (semver)
    pub version: String,

    /// Extension id, used to recognise our own uncaught errors
    pub extension_id: String,

    #[serde(default)]
    pub name: String,
}

#[derive(Debug)]
struct BootstrapInfo {
    environment: Environment,
    version: String,
    extension_id: String,
    name: String,
}

/// Toolkit state container.
#[derive(Debug, Default)]
pub struct ToolkitState {
    info: OnceLock<BootstrapInfo>,
    options: RwLock<HashMap<String, FeatureSetting>>,
}

impl ToolkitState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill the state from the Bootstrap payload. Returns false if it was already filled.
    pub(crate) fn bootstrap(&self, payload: BootstrapPayload) -> bool {
        let BootstrapPayload {
            options,
            environment,
            version,
            extension_id,
            name,
        } = payload;

        let installed = self
            .info
            .set(BootstrapInfo {
                environment,
                version,
                extension_id,
                name,
            })
            .is_ok();

        if installed {
            self.options.write().extend(options);
        }
        installed
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.info.get().is_some()
    }

    pub fn environment(&self) -> Option<Environment> {
        self.info.get().map(|i| i.environment)
    }

    pub fn version(&self) -> Option<&str> {
        self.info.get().map(|i| i.version.as_str())
    }

    pub fn extension_id(&self) -> Option<&str> {
        self.info.get().map(|i| i.extension_id.as_str())
    }

    pub fn name(&self) -> Option<&str> {
        self.info.get().map(|i| i.name.as_str())
    }

    /// Current setting of a named option.
    pub fn option(&self, name: &str) -> Option<FeatureSetting> {
        self.options.read().get(name).cloned()
    }

    /// Snapshot of every option.
    pub fn options(&self) -> HashMap<String, FeatureSetting> {
        self.options.read().clone()
    }

    pub fn is_option_enabled(&self, name: &str) -> bool {
        is_feature_enabled(self.options.read().get(name))
    }

    pub(crate) fn apply_setting(&self, name: &str, value: FeatureSetting) {
        self.options.write().insert(name.to_string(), value);
    }
}
