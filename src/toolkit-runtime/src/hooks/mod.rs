//! Lifecycle hooks on host components.
//!
//! Features register callbacks against a component category and one of the
//! three lifecycle events the host fires (`rendered`, `inserted`,
//! `updated`). The host installs a [`HookDispatcher`] once and calls it for
//! every lifecycle event on every component instance; the dispatcher runs
//! the matching callbacks in registration order.

mod types;
pub use types::{ComponentInstance, ComponentKey, Element, HookFn, LifecycleEvent, hook_fn};

mod registry;
pub use registry::HookRegistry;

mod dispatcher;
pub use dispatcher::HookDispatcher;
