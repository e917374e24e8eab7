//! Hook dispatcher the host calls when it fires a component lifecycle event.

use std::sync::Arc;

use super::registry::HookRegistry;
use super::types::{ComponentInstance, LifecycleEvent};
use crate::{Result, ToolkitError};

/// Dispatcher for lifecycle hooks.
///
/// The host installs one dispatcher on its component base type and calls
/// [`HookDispatcher::dispatch`] every time it fires a lifecycle event on any
/// component instance. Callback failures are not isolated here: the first
/// failing callback stops the dispatch and its error goes back to the host.
#[derive(Clone)]
pub struct HookDispatcher {
    registry: Arc<HookRegistry>,
}

impl HookDispatcher {
    /// Create a new dispatcher.
    pub fn new(registry: Arc<HookRegistry>) -> Self {
        Self { registry }
    }

    /// Fire every hook registered for `event` on the instance's component key.
    ///
    /// Returns the number of callbacks that ran.
    pub fn dispatch(&self, event: LifecycleEvent, instance: &ComponentInstance) -> Result<usize> {
        let hooks = self.registry.snapshot(&instance.key, event);

        for registered in hooks.iter() {
            (registered.callback)(&instance.element).map_err(|e| {
                ToolkitError::hook(
                    registered.feature.as_str(),
                    instance.key.as_str(),
                    event.as_str(),
                    format!("{e:#}"),
                )
            })?;
        }

        Ok(hooks.len())
    }

    /// Fire the hooks of every lifecycle event on one instance.
    pub fn replay(&self, instance: &ComponentInstance) -> Result<usize> {
        let mut fired = 0;
        for event in LifecycleEvent::ALL {
            fired += self.dispatch(event, instance)?;
        }
        Ok(fired)
    }

    /// Get the underlying registry.
    pub fn registry(&self) -> &Arc<HookRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::FeatureName;
    use crate::hooks::types::{ComponentKey, Element, hook_fn};
    use parking_lot::Mutex;

    const FEATURE: FeatureName = FeatureName::new("Recorder");

    #[test]
    fn test_dispatch_passes_root_element() {
        let registry = Arc::new(HookRegistry::new());
        let seen = Arc::new(Mutex::new(Vec::<Element>::new()));
        let sink = seen.clone();

        registry.add(
            FEATURE,
            ComponentKey::from("X"),
            LifecycleEvent::Rendered,
            hook_fn(move |el| {
                sink.lock().push(el.clone());
                Ok(())
            }),
        );

        let dispatcher = HookDispatcher::new(registry);
        let instance = ComponentInstance::new("X", "ember42");

        assert_eq!(dispatcher.dispatch(LifecycleEvent::Rendered, &instance).unwrap(), 1);
        assert_eq!(dispatcher.dispatch(LifecycleEvent::Inserted, &instance).unwrap(), 0);
        assert_eq!(*seen.lock(), vec![Element::new("ember42")]);
    }

    #[test]
    fn test_dispatch_ignores_other_components() {
        let registry = Arc::new(HookRegistry::new());
        registry.add(
            FEATURE,
            ComponentKey::from("X"),
            LifecycleEvent::Rendered,
            hook_fn(|_| Ok(())),
        );

        let dispatcher = HookDispatcher::new(registry);
        let other = ComponentInstance::new("Y", "ember1");
        assert_eq!(dispatcher.dispatch(LifecycleEvent::Rendered, &other).unwrap(), 0);
    }

    #[test]
    fn test_failing_hook_stops_dispatch() {
        let registry = Arc::new(HookRegistry::new());
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();

        registry.add(
            FEATURE,
            ComponentKey::from("X"),
            LifecycleEvent::Rendered,
            hook_fn(|_| anyhow::bail!("broken column")),
        );
        registry.add(
            FEATURE,
            ComponentKey::from("X"),
            LifecycleEvent::Rendered,
            hook_fn(move |_| {
                *counter.lock() += 1;
                Ok(())
            }),
        );

        let dispatcher = HookDispatcher::new(registry);
        let result = dispatcher.dispatch(LifecycleEvent::Rendered, &ComponentInstance::new("X", "e1"));

        assert!(matches!(result, Err(ToolkitError::Hook { .. })));
        assert_eq!(*calls.lock(), 0);
    }

    #[test]
    fn test_replay_fires_all_events() {
        let registry = Arc::new(HookRegistry::new());
        for event in LifecycleEvent::ALL {
            registry.add(FEATURE, ComponentKey::from("X"), event, hook_fn(|_| Ok(())));
        }

        let dispatcher = HookDispatcher::new(registry);
        assert_eq!(dispatcher.replay(&ComponentInstance::new("X", "e1")).unwrap(), 3);
    }
}
