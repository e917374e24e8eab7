//! Core hook types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Lifecycle events the host fires on its component base type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// The component finished rendering (initial render or re-render)
    Rendered,
    /// The component's root element was inserted into the document
    Inserted,
    /// The component re-rendered after an attribute change
    Updated,
}

impl LifecycleEvent {
    /// Every hookable event, in the order a bulk replay fires them.
    pub const ALL: [LifecycleEvent; 3] = [Self::Rendered, Self::Inserted, Self::Updated];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rendered => "rendered",
            Self::Inserted => "inserted",
            Self::Updated => "updated",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of host component, e.g. `register/grid-row`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentKey(String);

impl ComponentKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ComponentKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for ComponentKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Handle to a host DOM element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Element {
    /// Element id as the host reports it
    pub id: String,
}

impl Element {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// A live, rendered instance of a host component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentInstance {
    /// Component category
    pub key: ComponentKey,
    /// Root element of this instance
    pub element: Element,
}

impl ComponentInstance {
    pub fn new(key: impl Into<ComponentKey>, element_id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            element: Element::new(element_id),
        }
    }
}

/// Callback fired with the root element of the component instance.
pub type HookFn = Arc<dyn Fn(&Element) -> anyhow::Result<()> + Send + Sync>;

/// Box a closure as a [`HookFn`].
pub fn hook_fn<F>(f: F) -> HookFn
where
    F: Fn(&Element) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}
