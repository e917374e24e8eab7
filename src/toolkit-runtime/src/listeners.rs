//! Listener registries for cross-cutting signals.
//!
//! Features subscribe to coarse signals (host state mutations and in-app
//! navigation) on activation and unsubscribe on destroy. Subscriptions are
//! keyed by feature name, so subscribing twice is a no-op.

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::feature::{FeatureInstance, FeatureName};

/// Current in-app location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Route path, e.g. `/budget/abc/accounts`
    pub path: String,
    /// Budget the route belongs to
    #[serde(default)]
    pub budget_id: Option<String>,
}

impl Route {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            budget_id: None,
        }
    }

    pub fn with_budget(mut self, budget_id: impl Into<String>) -> Self {
        self.budget_id = Some(budget_id.into());
        self
    }
}

#[derive(Default)]
struct Subscribers {
    features: RwLock<IndexMap<FeatureName, Arc<FeatureInstance>>>,
}

impl Subscribers {
    fn add(&self, instance: Arc<FeatureInstance>) {
        self.features.write().insert(instance.name(), instance);
    }

    fn remove(&self, name: FeatureName) -> bool {
        self.features.write().shift_remove(&name).is_some()
    }

    fn contains(&self, name: FeatureName) -> bool {
        self.features.read().contains_key(&name)
    }

    fn len(&self) -> usize {
        self.features.read().len()
    }

    fn snapshot(&self) -> Vec<Arc<FeatureInstance>> {
        self.features.read().values().cloned().collect()
    }
}

/// Subscribers to host state mutations.
#[derive(Default)]
pub struct ObserveListener {
    subscribers: Subscribers,
}

impl ObserveListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_feature(&self, instance: Arc<FeatureInstance>) {
        self.subscribers.add(instance);
    }

    pub fn remove_feature(&self, name: FeatureName) -> bool {
        self.subscribers.remove(name)
    }

    pub fn contains(&self, name: FeatureName) -> bool {
        self.subscribers.contains(name)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Notify every subscriber. Returns how many were notified.
    pub fn emit(&self, changed: &[String]) -> usize {
        let subscribers = self.subscribers.snapshot();
        for instance in &subscribers {
            instance.observe(changed);
        }
        subscribers.len()
    }
}

/// Subscribers to in-app navigation.
#[derive(Default)]
pub struct RouteChangeListener {
    subscribers: Subscribers,
    last_budget: Mutex<Option<String>>,
}

impl RouteChangeListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_feature(&self, instance: Arc<FeatureInstance>) {
        self.subscribers.add(instance);
    }

    pub fn remove_feature(&self, name: FeatureName) -> bool {
        self.subscribers.remove(name)
    }

    pub fn contains(&self, name: FeatureName) -> bool {
        self.subscribers.contains(name)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Notify every subscriber of a route change.
    ///
    /// When the route belongs to a different budget than the previous one,
    /// `on_budget_changed` runs before `on_route_changed`.
    pub fn emit(&self, route: &Route) -> usize {
        let budget_changed = {
            let mut last = self.last_budget.lock();
            match &route.budget_id {
                Some(id) if last.as_deref() != Some(id.as_str()) => {
                    *last = Some(id.clone());
                    true
                }
                _ => false,
            }
        };

        let subscribers = self.subscribers.snapshot();
        for instance in &subscribers {
            if budget_changed {
                if let Some(budget_id) = &route.budget_id {
                    instance.on_budget_changed(budget_id);
                }
            }
            instance.on_route_changed(route);
        }
        subscribers.len()
    }
}
