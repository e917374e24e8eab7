//! Core feature types and traits.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use crate::guard::Guard;
use crate::hooks::{ComponentKey, Element, HookRegistry, LifecycleEvent, hook_fn};
use crate::host::Host;
use crate::listeners::Route;
use crate::report::{ErrorReport, ErrorReporter, FeatureFunction};
use crate::state::ToolkitState;
use crate::storage::SettingsStore;

/// Stable identity of a feature.
///
/// Every feature carries its own name as a constant; the name doubles as the
/// option key in the bootstrap configuration and in setting-change messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct FeatureName(&'static str);

impl FeatureName {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl PartialEq<str> for FeatureName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl Borrow<str> for FeatureName {
    fn borrow(&self) -> &str {
        self.0
    }
}

/// Setting value of one feature.
///
/// Multi-option features encode their selected variant as a string, so a
/// setting is either a plain flag or a variant name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureSetting {
    Bool(bool),
    Variant(String),
}

impl FeatureSetting {
    /// Variant string that means "off" for multi-option features.
    pub const DISABLED_VARIANT: &'static str = "0";

    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Bool(enabled) => *enabled,
            Self::Variant(variant) => variant != Self::DISABLED_VARIANT,
        }
    }

    /// Selected variant, if this is a multi-option setting.
    pub fn variant(&self) -> Option<&str> {
        match self {
            Self::Bool(_) => None,
            Self::Variant(variant) => Some(variant),
        }
    }
}

impl From<bool> for FeatureSetting {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for FeatureSetting {
    fn from(value: &str) -> Self {
        Self::Variant(value.to_string())
    }
}

impl fmt::Display for FeatureSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Variant(variant) => f.write_str(variant),
        }
    }
}

/// A setting is enabled when present and not a disabled sentinel.
pub fn is_feature_enabled(setting: Option<&FeatureSetting>) -> bool {
    setting.is_some_and(FeatureSetting::is_enabled)
}

/// Trait for feature implementations.
///
/// Only [`Feature::name`] is required. The defaults make a feature that
/// never invokes, injects no CSS and cannot be torn down; a feature whose
/// `should_invoke` returns true must override [`Feature::invoke`].
#[async_trait]
pub trait Feature: Send + Sync {
    /// Feature identity.
    fn name(&self) -> FeatureName;

    /// Evaluated right before every invoke.
    fn should_invoke(&self, _ctx: &FeatureContext) -> anyhow::Result<bool> {
        Ok(false)
    }

    /// One-time setup awaited before the first invoke of an activation pass.
    async fn will_invoke(&self, _ctx: &FeatureContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Apply the feature's effects.
    fn invoke(&self, _ctx: &FeatureContext) -> anyhow::Result<()> {
        anyhow::bail!(
            "Feature: {} does not implement required invoke() method.",
            self.name()
        )
    }

    /// Undo what `invoke` created.
    fn destroy(&self, _ctx: &FeatureContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Stylesheet injected while the feature is enabled.
    fn inject_css(&self, _ctx: &FeatureContext) -> anyhow::Result<String> {
        Ok(String::new())
    }

    /// Host state mutated; `changed` lists the affected node markers.
    fn observe(&self, _ctx: &FeatureContext, _changed: &[String]) -> anyhow::Result<()> {
        Ok(())
    }

    /// In-app navigation happened.
    fn on_route_changed(&self, _ctx: &FeatureContext, _route: &Route) -> anyhow::Result<()> {
        Ok(())
    }

    /// The active budget changed.
    fn on_budget_changed(&self, _ctx: &FeatureContext, _budget_id: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Collaborators shared by every feature instance.
#[derive(Clone)]
pub struct FeatureServices {
    pub hooks: Arc<HookRegistry>,
    pub host: Arc<dyn Host>,
    pub storage: Arc<dyn SettingsStore>,
    pub reporter: Arc<dyn ErrorReporter>,
    pub state: Arc<ToolkitState>,
}

/// What a feature sees while one of its entry points runs.
#[derive(Clone)]
pub struct FeatureContext {
    name: FeatureName,
    setting: Option<FeatureSetting>,
    services: Arc<FeatureServices>,
}

impl FeatureContext {
    pub fn new(
        name: FeatureName,
        setting: Option<FeatureSetting>,
        services: Arc<FeatureServices>,
    ) -> Self {
        Self {
            name,
            setting,
            services,
        }
    }

    pub fn name(&self) -> FeatureName {
        self.name
    }

    /// Setting at the time the entry point was called.
    pub fn setting(&self) -> Option<&FeatureSetting> {
        self.setting.as_ref()
    }

    pub fn is_enabled(&self) -> bool {
        is_feature_enabled(self.setting.as_ref())
    }

    /// Register a lifecycle hook owned by this feature.
    pub fn add_hook<F>(&self, component: impl Into<ComponentKey>, event: LifecycleEvent, callback: F)
    where
        F: Fn(&Element) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.services
            .hooks
            .add(self.name, component.into(), event, hook_fn(callback));
    }

    pub fn host(&self) -> &Arc<dyn Host> {
        &self.services.host
    }

    pub fn storage(&self) -> &Arc<dyn SettingsStore> {
        &self.services.storage
    }

    pub fn state(&self) -> &Arc<ToolkitState> {
        &self.services.state
    }

    /// Report an error against this feature without a function name.
    pub fn log_error(&self, error: &anyhow::Error) {
        self.services.reporter.report(ErrorReport::new(
            format!("{error:#}"),
            self.name.as_str(),
            self.setting.clone(),
            None,
        ));
    }
}

/// One constructed feature and its current setting.
///
/// Instances are created once at bootstrap and live as long as the runtime;
/// disabling a feature only removes its side effects. Every entry point is
/// called through a [`Guard`], so errors and panics are reported and never
/// escape.
pub struct FeatureInstance {
    name: FeatureName,
    feature: Arc<dyn Feature>,
    setting: RwLock<Option<FeatureSetting>>,
    services: Arc<FeatureServices>,
}

impl FeatureInstance {
    pub fn new(
        feature: Arc<dyn Feature>,
        setting: Option<FeatureSetting>,
        services: Arc<FeatureServices>,
    ) -> Self {
        Self {
            name: feature.name(),
            feature,
            setting: RwLock::new(setting),
            services,
        }
    }

    pub fn name(&self) -> FeatureName {
        self.name
    }

    pub fn setting(&self) -> Option<FeatureSetting> {
        self.setting.read().clone()
    }

    pub fn is_enabled(&self) -> bool {
        is_feature_enabled(self.setting.read().as_ref())
    }

    pub(crate) fn set_setting(&self, setting: FeatureSetting) {
        *self.setting.write() = Some(setting);
    }

    /// Context handed to the feature for one call.
    pub fn context(&self) -> FeatureContext {
        FeatureContext::new(self.name, self.setting(), self.services.clone())
    }

    fn guard(&self) -> Guard<'_> {
        Guard::new(self.services.reporter.as_ref(), self.name, self.setting())
    }

    /// Stylesheet text, or `None` when the feature has none or failed to produce it.
    pub fn inject_css(&self) -> Option<String> {
        let ctx = self.context();
        self.guard()
            .call(FeatureFunction::InjectCss, || self.feature.inject_css(&ctx))
            .filter(|css| !css.is_empty())
    }

    /// A failing predicate counts as "do not invoke".
    pub fn should_invoke(&self) -> bool {
        let ctx = self.context();
        self.guard()
            .call(FeatureFunction::ShouldInvoke, || self.feature.should_invoke(&ctx))
            .unwrap_or(false)
    }

    /// Returns whether the feature's setup completed without error.
    pub async fn will_invoke(&self) -> bool {
        let ctx = self.context();
        self.guard()
            .call_async(FeatureFunction::WillInvoke, self.feature.will_invoke(&ctx))
            .await
            .is_some()
    }

    /// Returns whether invoke completed without error.
    pub fn invoke(&self) -> bool {
        let ctx = self.context();
        self.guard()
            .call(FeatureFunction::Invoke, || self.feature.invoke(&ctx))
            .is_some()
    }

    pub fn destroy(&self) -> bool {
        let ctx = self.context();
        self.guard()
            .call(FeatureFunction::Destroy, || self.feature.destroy(&ctx))
            .is_some()
    }

    pub fn observe(&self, changed: &[String]) -> bool {
        let ctx = self.context();
        self.guard()
            .call(FeatureFunction::Observe, || self.feature.observe(&ctx, changed))
            .is_some()
    }

    pub fn on_route_changed(&self, route: &Route) -> bool {
        let ctx = self.context();
        self.guard()
            .call(FeatureFunction::OnRouteChanged, || {
                self.feature.on_route_changed(&ctx, route)
            })
            .is_some()
    }

    pub fn on_budget_changed(&self, budget_id: &str) -> bool {
        let ctx = self.context();
        self.guard()
            .call(FeatureFunction::OnBudgetChanged, || {
                self.feature.on_budget_changed(&ctx, budget_id)
            })
            .is_some()
    }

    /// Strip every lifecycle hook this feature registered.
    pub fn remove_hooks(&self) -> usize {
        self.services.hooks.remove_feature(self.name)
    }
}

impl fmt::Debug for FeatureInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureInstance")
            .field("name", &self.name)
            .field("setting", &self.setting())
            .finish()
    }
}
