//! # Toolkit Runtime
//!
//! Lifecycle runtime for independently toggleable features attached to a
//! host single-page application that does not cooperate with them.
//!
//! ## Overview
//!
//! - **Features**: units implementing [`Feature`], one instance per declared
//!   feature, enabled and disabled at runtime by setting changes
//! - **Hooks**: callbacks on the host's component lifecycle events, fired by
//!   a [`HookDispatcher`] the host installs once
//! - **Listeners**: coarse subscriptions to host state mutations and route
//!   changes
//! - **Message bus**: `toolkit-bootstrap` and `toolkit-setting-changed` in,
//!   `toolkit-loaded` out
//! - **Error isolation**: every feature entry point runs behind a guard that
//!   reports and swallows errors and panics
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use toolkit_runtime::{
//!     FeatureCatalog, MemoryHost, MemorySettingsStore, Toolkit, ToolkitConfig,
//!     TracingErrorReporter, message_channel,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let catalog = FeatureCatalog::new().with(|| Arc::new(MyFeature))?;
//!     let toolkit = Toolkit::new(
//!         ToolkitConfig::default(),
//!         catalog,
//!         Arc::new(MemoryHost::new()),
//!         Arc::new(MemorySettingsStore::new()),
//!         Arc::new(TracingErrorReporter),
//!     );
//!
//!     let (sender, receiver) = message_channel();
//!     toolkit.initialize(receiver)?;
//!     // The privileged context answers `toolkit-loaded` with a bootstrap message.
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod feature;
pub mod guard;
pub mod hooks;
pub mod host;
pub mod listeners;
pub mod messages;
pub mod readiness;
pub mod release;
pub mod report;
pub mod scenario;
pub mod state;
pub mod storage;
pub mod toolkit;

// Re-exports for convenience
pub use catalog::{FeatureCatalog, FeatureFactory};
pub use config::ToolkitConfig;
pub use error::{Result, ToolkitError};
pub use feature::{
    Feature, FeatureContext, FeatureInstance, FeatureName, FeatureServices, FeatureSetting,
    is_feature_enabled,
};
pub use guard::Guard;
pub use hooks::{
    ComponentInstance, ComponentKey, Element, HookDispatcher, HookFn, HookRegistry,
    LifecycleEvent, hook_fn,
};
pub use host::{Host, HostSnapshot, MemoryHost, UncaughtErrorListener};
pub use listeners::{ObserveListener, Route, RouteChangeListener};
pub use messages::{
    Envelope, InboundMessage, MessageReceiver, MessageSender, MessageSource, OutboundMessage,
    SettingChange, message_channel,
};
pub use readiness::ReadinessPoller;
pub use release::{ReleaseCheck, check_release_version};
pub use report::{
    ErrorReport, ErrorReporter, FeatureFunction, MemoryErrorReporter, TracingErrorReporter,
    UncaughtError, report_uncaught,
};
pub use scenario::{Scenario, ScenarioReport, ScenarioRunner, ScenarioStep};
pub use state::{BootstrapPayload, Environment, ToolkitState};
pub use storage::{MemorySettingsStore, SettingsStore};
pub use toolkit::{MessageOutcome, Toolkit};

/// Runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
