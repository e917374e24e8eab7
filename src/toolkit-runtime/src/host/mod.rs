//! Seam between the runtime and the host application.
//!
//! The runtime never reaches into host internals. Everything it needs from
//! the page (readiness, the component base type, the document head, the
//! outbound message port) goes through [`Host`].

use std::sync::Arc;

use crate::hooks::{ComponentInstance, ComponentKey, HookDispatcher};
use crate::messages::OutboundMessage;
use crate::report::UncaughtError;

mod memory;
pub use memory::{HostSnapshot, MemoryHost};

/// Listener for the host's window-level error event.
pub type UncaughtErrorListener = Arc<dyn Fn(&UncaughtError) + Send + Sync>;

/// Host application as seen by the runtime.
pub trait Host: Send + Sync {
    /// Whether the host application has finished bootstrapping.
    fn is_ready(&self) -> bool;

    /// Install the lifecycle dispatcher on the host's component base type.
    ///
    /// The host calls the dispatcher for every `rendered`, `inserted` and
    /// `updated` event on any component instance from then on.
    fn install_lifecycle_hooks(&self, dispatcher: HookDispatcher);

    /// Live rendered instances of a component category.
    fn rendered_components(&self, key: &ComponentKey) -> Vec<ComponentInstance>;

    /// Insert a stylesheet element, replacing one with the same id.
    fn upsert_style(&self, id: &str, css: &str);

    /// Remove a stylesheet element. Returns whether it existed.
    fn remove_style(&self, id: &str) -> bool;

    /// Post a message to the privileged context.
    fn post_message(&self, message: OutboundMessage);

    /// Full page reload.
    fn reload(&self);

    /// Show the "new release" notice for `version`.
    fn show_release_notice(&self, version: &str);

    /// Subscribe to uncaught errors raised anywhere in the page.
    fn add_error_listener(&self, listener: UncaughtErrorListener);
}
