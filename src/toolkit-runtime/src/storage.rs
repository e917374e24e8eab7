//! Settings-storage collaborator.
//!
//! Persistent storage is owned by the embedding extension; the runtime only
//! reads feature settings, keeps a few plain keys (the last seen release
//! version) and listens for the master switch changing.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::Result;
use crate::feature::{FeatureSetting, is_feature_enabled};

/// Identifies a disable-switch subscription.
pub type ListenerId = Uuid;

/// Called with the switch name and whether the toolkit is now disabled.
pub type DisabledListener = Arc<dyn Fn(&str, bool) + Send + Sync>;

/// Storage collaborator consumed by the runtime and by features.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Current value of a feature setting.
    async fn get_feature_setting(&self, key: &str) -> Result<Option<FeatureSetting>>;

    /// Persist a feature setting.
    async fn set_feature_setting(&self, key: &str, value: FeatureSetting) -> Result<()>;

    /// Plain string key used by the runtime itself.
    async fn get_key(&self, key: &str) -> Result<Option<String>>;

    async fn set_key(&self, key: &str, value: &str) -> Result<()>;

    /// Subscribe to changes of the master disable switch.
    fn on_toolkit_disabled_changed(&self, listener: DisabledListener) -> ListenerId;

    /// Drop a subscription. Returns false for unknown ids.
    fn off_toolkit_disabled_changed(&self, id: ListenerId) -> bool;
}

/// In-memory settings store.
pub struct MemorySettingsStore {
    disable_switch: String,
    settings: RwLock<HashMap<String, FeatureSetting>>,
    keys: RwLock<HashMap<String, String>>,
    listeners: RwLock<HashMap<ListenerId, DisabledListener>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::with_disable_switch("DisableToolkit")
    }

    pub fn with_disable_switch(disable_switch: impl Into<String>) -> Self {
        Self {
            disable_switch: disable_switch.into(),
            settings: RwLock::new(HashMap::new()),
            keys: RwLock::new(HashMap::new()),
            listeners: RwLock::new(HashMap::new()),
        }
    }

    /// Seed settings without notifying listeners.
    pub fn with_settings<I, K>(self, settings: I) -> Self
    where
        I: IntoIterator<Item = (K, FeatureSetting)>,
        K: Into<String>,
    {
        self.settings
            .write()
            .extend(settings.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    fn notify_disabled(&self, disabled: bool) {
        let listeners: Vec<DisabledListener> = self.listeners.read().values().cloned().collect();
        for listener in listeners {
            listener(&self.disable_switch, disabled);
        }
    }
}

impl Default for MemorySettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get_feature_setting(&self, key: &str) -> Result<Option<FeatureSetting>> {
        Ok(self.settings.read().get(key).cloned())
    }

    async fn set_feature_setting(&self, key: &str, value: FeatureSetting) -> Result<()> {
        let disabled = is_feature_enabled(Some(&value));
        let previous = self.settings.write().insert(key.to_string(), value);

        if key == self.disable_switch && is_feature_enabled(previous.as_ref()) != disabled {
            tracing::debug!("Toolkit disabled switch changed: {}", disabled);
            self.notify_disabled(disabled);
        }
        Ok(())
    }

    async fn get_key(&self, key: &str) -> Result<Option<String>> {
        Ok(self.keys.read().get(key).cloned())
    }

    async fn set_key(&self, key: &str, value: &str) -> Result<()> {
        self.keys.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn on_toolkit_disabled_changed(&self, listener: DisabledListener) -> ListenerId {
        let id = Uuid::new_v4();
        self.listeners.write().insert(id, listener);
        id
    }

    fn off_toolkit_disabled_changed(&self, id: ListenerId) -> bool {
        self.listeners.write().remove(&id).is_some()
    }
}
