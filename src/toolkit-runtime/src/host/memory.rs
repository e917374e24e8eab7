//! In-memory host used by the scripted driver and by tests.

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{Host, UncaughtErrorListener};
use crate::Result;
use crate::hooks::{ComponentInstance, ComponentKey, HookDispatcher, LifecycleEvent};
use crate::messages::OutboundMessage;
use crate::report::UncaughtError;

/// Observable host state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostSnapshot {
    pub ready: bool,
    pub styles: IndexMap<String, String>,
    pub components: Vec<ComponentInstance>,
    pub outbox: Vec<OutboundMessage>,
    pub reloads: usize,
    pub release_notices: Vec<String>,
}

/// Host that keeps its document in memory.
///
/// Lifecycle events only reach the runtime once a dispatcher has been
/// installed, like a real component base type that has not been patched yet.
#[derive(Default)]
pub struct MemoryHost {
    ready: AtomicBool,
    dispatcher: Mutex<Option<HookDispatcher>>,
    dispatcher_installs: AtomicUsize,
    components: RwLock<IndexMap<ComponentKey, Vec<ComponentInstance>>>,
    styles: RwLock<IndexMap<String, String>>,
    outbox: Mutex<Vec<OutboundMessage>>,
    reloads: AtomicUsize,
    release_notices: Mutex<Vec<String>>,
    error_listeners: RwLock<Vec<UncaughtErrorListener>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Mount a component instance: fires `inserted` then `rendered`.
    ///
    /// Returns the number of callbacks that ran. A failing callback aborts
    /// the dispatch and its error is returned.
    pub fn render(&self, key: &str, element_id: &str) -> Result<usize> {
        let instance = ComponentInstance::new(key, element_id);
        {
            let mut components = self.components.write();
            let instances = components.entry(instance.key.clone()).or_default();
            if !instances.contains(&instance) {
                instances.push(instance.clone());
            }
        }

        let mut fired = self.fire(LifecycleEvent::Inserted, &instance)?;
        fired += self.fire(LifecycleEvent::Rendered, &instance)?;
        Ok(fired)
    }

    /// Re-render a mounted instance: fires `updated` then `rendered`.
    pub fn rerender(&self, key: &str, element_id: &str) -> Result<usize> {
        let instance = ComponentInstance::new(key, element_id);
        let mut fired = self.fire(LifecycleEvent::Updated, &instance)?;
        fired += self.fire(LifecycleEvent::Rendered, &instance)?;
        Ok(fired)
    }

    /// Fire one lifecycle event on an instance.
    pub fn fire(&self, event: LifecycleEvent, instance: &ComponentInstance) -> Result<usize> {
        // Callbacks may call back into the host.
        let dispatcher = self.dispatcher.lock().clone();
        match dispatcher {
            Some(dispatcher) => dispatcher.dispatch(event, instance),
            None => Ok(0),
        }
    }

    pub fn remove_component(&self, key: &str, element_id: &str) -> bool {
        let instance = ComponentInstance::new(key, element_id);
        let mut components = self.components.write();
        match components.get_mut(&instance.key) {
            Some(instances) => {
                let before = instances.len();
                instances.retain(|i| i != &instance);
                before != instances.len()
            }
            None => false,
        }
    }

    /// Raise an uncaught error through every registered error listener.
    pub fn raise_uncaught(&self, error: &UncaughtError) {
        let listeners: Vec<UncaughtErrorListener> = self.error_listeners.read().clone();
        for listener in listeners {
            listener(error);
        }
    }

    pub fn styles(&self) -> IndexMap<String, String> {
        self.styles.read().clone()
    }

    pub fn style(&self, id: &str) -> Option<String> {
        self.styles.read().get(id).cloned()
    }

    pub fn has_style(&self, id: &str) -> bool {
        self.styles.read().contains_key(id)
    }

    pub fn outbox(&self) -> Vec<OutboundMessage> {
        self.outbox.lock().clone()
    }

    pub fn reload_count(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }

    pub fn release_notices(&self) -> Vec<String> {
        self.release_notices.lock().clone()
    }

    pub fn dispatcher_installs(&self) -> usize {
        self.dispatcher_installs.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> HostSnapshot {
        HostSnapshot {
            ready: self.is_ready(),
            styles: self.styles(),
            components: self.components.read().values().flatten().cloned().collect(),
            outbox: self.outbox(),
            reloads: self.reload_count(),
            release_notices: self.release_notices(),
        }
    }
}

impl Host for MemoryHost {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn install_lifecycle_hooks(&self, dispatcher: HookDispatcher) {
        *self.dispatcher.lock() = Some(dispatcher);
        self.dispatcher_installs.fetch_add(1, Ordering::SeqCst);
    }

    fn rendered_components(&self, key: &ComponentKey) -> Vec<ComponentInstance> {
        self.components.read().get(key).cloned().unwrap_or_default()
    }

    fn upsert_style(&self, id: &str, css: &str) {
        self.styles.write().insert(id.to_string(), css.to_string());
    }

    fn remove_style(&self, id: &str) -> bool {
        self.styles.write().shift_remove(id).is_some()
    }

    fn post_message(&self, message: OutboundMessage) {
        self.outbox.lock().push(message);
    }

    fn reload(&self) {
        tracing::info!("Host page reload requested");
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }

    fn show_release_notice(&self, version: &str) {
        self.release_notices.lock().push(version.to_string());
    }

    fn add_error_listener(&self, listener: UncaughtErrorListener) {
        self.error_listeners.write().push(listener);
    }
}
