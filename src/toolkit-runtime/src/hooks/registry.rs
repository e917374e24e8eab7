//! Hook registry for storing lifecycle callbacks per component category.
//!
//! Callbacks are stored per component key and lifecycle event, in
//! registration order. Every key that ever received a hook is remembered in
//! the hooked-component set, which is never pruned and drives the delayed
//! bulk replay.

use indexmap::IndexSet;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::types::{ComponentKey, HookFn, LifecycleEvent};
use crate::feature::FeatureName;

/// Registered hook with its owning feature.
#[derive(Clone)]
pub(crate) struct RegisteredHook {
    pub feature: FeatureName,
    pub callback: HookFn,
}

#[derive(Default)]
struct HookTable {
    hooks: HashMap<ComponentKey, HashMap<LifecycleEvent, Vec<RegisteredHook>>>,
    hooked_components: IndexSet<ComponentKey>,
}

/// Registry of feature hooks on host component lifecycle events.
pub struct HookRegistry {
    table: RwLock<HookTable>,
}

impl HookRegistry {
    /// Create a new hook registry.
    pub fn new() -> Self {
        Self {
            table: RwLock::new(HookTable::default()),
        }
    }

    /// Append a hook for `event` on every instance of `component`.
    pub fn add(
        &self,
        feature: FeatureName,
        component: ComponentKey,
        event: LifecycleEvent,
        callback: HookFn,
    ) {
        let mut table = self.table.write();
        table.hooked_components.insert(component.clone());
        table
            .hooks
            .entry(component.clone())
            .or_default()
            .entry(event)
            .or_default()
            .push(RegisteredHook { feature, callback });

        tracing::debug!("Feature {} hooked {} on {}", feature, event, component);
    }

    /// Strip every hook owned by `feature`. Returns how many were removed.
    pub fn remove_feature(&self, feature: FeatureName) -> usize {
        let mut table = self.table.write();
        let mut removed = 0;

        for events in table.hooks.values_mut() {
            for hooks in events.values_mut() {
                let before = hooks.len();
                hooks.retain(|h| h.feature != feature);
                removed += before - hooks.len();
            }
        }

        if removed > 0 {
            tracing::debug!("Removed {} hooks of feature {}", removed, feature);
        }

        removed
    }

    /// Snapshot of the hooks for one component key and event, in registration order.
    pub(crate) fn snapshot(
        &self,
        component: &ComponentKey,
        event: LifecycleEvent,
    ) -> Vec<RegisteredHook> {
        self.table
            .read()
            .hooks
            .get(component)
            .and_then(|events| events.get(&event))
            .cloned()
            .unwrap_or_default()
    }

    /// Number of hooks registered for a component key and event.
    pub fn hook_count(&self, component: &ComponentKey, event: LifecycleEvent) -> usize {
        self.table
            .read()
            .hooks
            .get(component)
            .and_then(|events| events.get(&event))
            .map_or(0, Vec::len)
    }

    /// Number of hooks owned by a feature across all components.
    pub fn feature_hook_count(&self, feature: FeatureName) -> usize {
        self.table
            .read()
            .hooks
            .values()
            .flat_map(|events| events.values())
            .flat_map(|hooks| hooks.iter())
            .filter(|h| h.feature == feature)
            .count()
    }

    /// Every component key that has ever been hooked, in first-hooked order.
    pub fn hooked_components(&self) -> Vec<ComponentKey> {
        self.table.read().hooked_components.iter().cloned().collect()
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}
