//! Feature lifecycle orchestrator.
//!
//! [`Toolkit`] owns every feature instance and drives them through the
//! message bus:
//!
//! 1. `initialize` spawns the inbound message loop and announces
//!    `toolkit-loaded`.
//! 2. Bootstrap fills the state, builds one instance per declared feature
//!    and starts waiting for the host.
//! 3. Once the host is ready (and the master switch is off) the lifecycle
//!    dispatcher is installed, stylesheets are injected, the release notice
//!    is checked and every enabled feature is activated concurrently. Hooks
//!    are replayed over already-rendered components shortly after the pass
//!    starts, whether or not every activation has finished.
//! 4. Setting changes enable or disable single features, or reload the page
//!    when the master switch is turned on.

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::catalog::FeatureCatalog;
use crate::config::ToolkitConfig;
use crate::feature::{FeatureInstance, FeatureName, FeatureServices, FeatureSetting};
use crate::hooks::{ComponentKey, HookDispatcher, HookRegistry};
use crate::host::Host;
use crate::listeners::{ObserveListener, Route, RouteChangeListener};
use crate::messages::{Envelope, InboundMessage, MessageReceiver, OutboundMessage, SettingChange};
use crate::readiness::ReadinessPoller;
use crate::release::check_release_version;
use crate::report::{ErrorReporter, report_uncaught};
use crate::state::{BootstrapPayload, ToolkitState};
use crate::storage::SettingsStore;
use crate::{Result, ToolkitError};

/// What handling one inbound message did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "feature", rename_all = "snake_case")]
pub enum MessageOutcome {
    /// Posted from another window; dropped unread.
    ForeignSource,
    Bootstrapped,
    /// A second Bootstrap; the state is only filled once.
    AlreadyBootstrapped,
    /// The master switch was turned on.
    Reloaded,
    Enabled(FeatureName),
    Disabled(FeatureName),
    /// No feature with that name.
    UnknownFeature(String),
}

/// Feature lifecycle orchestrator.
pub struct Toolkit {
    config: ToolkitConfig,
    catalog: FeatureCatalog,
    services: Arc<FeatureServices>,
    dispatcher: HookDispatcher,
    poller: ReadinessPoller,
    instances: RwLock<IndexMap<FeatureName, Arc<FeatureInstance>>>,
    observe_listener: ObserveListener,
    route_listener: RouteChangeListener,
    initialized: AtomicBool,
    loaded: watch::Sender<bool>,
    /// Number of features activated by the first pass, once it has joined.
    activated: watch::Sender<Option<usize>>,
}

impl Toolkit {
    pub fn new(
        config: ToolkitConfig,
        catalog: FeatureCatalog,
        host: Arc<dyn Host>,
        storage: Arc<dyn SettingsStore>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Arc<Self> {
        let hooks = Arc::new(HookRegistry::new());
        let services = Arc::new(FeatureServices {
            hooks: hooks.clone(),
            host,
            storage,
            reporter,
            state: Arc::new(ToolkitState::new()),
        });
        let (loaded, _) = watch::channel(false);
        let (activated, _) = watch::channel(None);

        Arc::new(Self {
            poller: ReadinessPoller::from_config(&config),
            config,
            catalog,
            services,
            dispatcher: HookDispatcher::new(hooks),
            instances: RwLock::new(IndexMap::new()),
            observe_listener: ObserveListener::new(),
            route_listener: RouteChangeListener::new(),
            initialized: AtomicBool::new(false),
            loaded,
            activated,
        })
    }

    /// Start handling inbound messages and announce readiness.
    ///
    /// May only be called once.
    pub fn initialize(self: &Arc<Self>, mut receiver: MessageReceiver) -> Result<JoinHandle<()>> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(ToolkitError::AlreadyInitialized);
        }

        let toolkit = Arc::clone(self);
        let handle = tokio::spawn(async move {
            while let Some(envelope) = receiver.recv().await {
                toolkit.on_background_message(envelope);
            }
            tracing::debug!("Inbound message channel closed");
        });

        self.services.host.post_message(OutboundMessage::ToolkitLoaded);
        tracing::info!("Toolkit initialized");
        Ok(handle)
    }

    /// Message-bus endpoint.
    pub fn on_background_message(self: &Arc<Self>, envelope: Envelope) -> MessageOutcome {
        if !envelope.is_same_window() {
            tracing::debug!(
                "Ignoring {} message from {:?}",
                envelope.message.kind(),
                envelope.source
            );
            return MessageOutcome::ForeignSource;
        }

        match envelope.message {
            InboundMessage::Bootstrap { toolkit } => self.handle_bootstrap(toolkit),
            InboundMessage::SettingChanged { setting } => self.handle_setting_changed(setting),
        }
    }

    fn handle_bootstrap(self: &Arc<Self>, payload: BootstrapPayload) -> MessageOutcome {
        if !self.services.state.bootstrap(payload) {
            tracing::warn!("Ignoring repeated bootstrap message");
            return MessageOutcome::AlreadyBootstrapped;
        }

        self.setup_error_tracking();

        let instances: IndexMap<FeatureName, Arc<FeatureInstance>> = self
            .catalog
            .build()
            .into_iter()
            .map(|feature| {
                let setting = self.services.state.option(feature.name().as_str());
                let instance = FeatureInstance::new(feature, setting, self.services.clone());
                (instance.name(), Arc::new(instance))
            })
            .collect();
        tracing::info!(
            "Toolkit bootstrapped ({} v{}) with {} features",
            self.services.state.environment().map(|e| e.to_string()).unwrap_or_default(),
            self.services.state.version().unwrap_or_default(),
            instances.len()
        );
        *self.instances.write() = instances;

        let toolkit = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = toolkit.wait_for_user_settings().await {
                tracing::error!("Toolkit failed to start: {}", e);
            }
        });

        MessageOutcome::Bootstrapped
    }

    fn handle_setting_changed(&self, setting: SettingChange) -> MessageOutcome {
        let SettingChange { name, value } = setting;

        if name == self.config.disable_switch && value.is_enabled() {
            tracing::info!("Toolkit disabled, reloading host page");
            self.services.host.reload();
            return MessageOutcome::Reloaded;
        }

        self.services.state.apply_setting(&name, value.clone());

        let Some(instance) = self.feature(&name) else {
            tracing::debug!("Setting change for unknown feature {}", name);
            return MessageOutcome::UnknownFeature(name);
        };

        instance.set_setting(value);

        if instance.is_enabled() {
            tracing::info!("Enabling feature {}", instance.name());
            self.inject_feature_css(&instance);
            self.apply_listeners(&instance);
            self.invoke_feature(&instance);
            MessageOutcome::Enabled(instance.name())
        } else {
            tracing::info!("Disabling feature {}", instance.name());
            self.destroy_feature(&instance);
            MessageOutcome::Disabled(instance.name())
        }
    }

    fn setup_error_tracking(&self) {
        let reporter = self.services.reporter.clone();
        let extension_id = self
            .services
            .state
            .extension_id()
            .unwrap_or_default()
            .to_string();

        self.services.host.add_error_listener(Arc::new(move |error| {
            report_uncaught(reporter.as_ref(), &extension_id, error);
        }));
    }

    /// Wait for the host, then run the one-time setup and the first activation pass.
    async fn wait_for_user_settings(self: Arc<Self>) -> Result<()> {
        let host = self.services.host.clone();
        self.poller.wait(|| host.is_ready()).await?;

        host.install_lifecycle_hooks(self.dispatcher.clone());

        if self.services.state.is_option_enabled(&self.config.disable_switch) {
            tracing::info!("Toolkit is disabled, no features will run");
            return Ok(());
        }

        self.apply_feature_css();

        if let Err(e) = check_release_version(
            self.services.storage.as_ref(),
            host.as_ref(),
            &self.services.state,
        )
        .await
        {
            tracing::warn!("Release version check failed: {}", e);
        }

        let toolkit = Arc::clone(&self);
        let pass = tokio::spawn(async move { toolkit.invoke_feature_instances().await });

        let toolkit = Arc::clone(&self);
        let delay = self.config.hook_replay_delay();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            toolkit.invoke_all_hooks();
        });

        self.loaded.send_replace(true);
        tracing::info!("Toolkit loaded");

        match pass.await {
            Ok(activated) => {
                tracing::info!("{} features activated", activated);
                self.activated.send_replace(Some(activated));
            }
            Err(e) => tracing::warn!("Activation pass failed: {}", e),
        }
        Ok(())
    }

    fn apply_feature_css(&self) {
        if !self.config.global_css.is_empty() {
            self.services
                .host
                .upsert_style(&self.config.global_style_id, &self.config.global_css);
        }

        for instance in self.instances() {
            if instance.is_enabled() {
                self.inject_feature_css(&instance);
            }
        }
    }

    fn inject_feature_css(&self, instance: &FeatureInstance) {
        if let Some(css) = instance.inject_css() {
            let id = self.config.feature_style_id(instance.name().as_str());
            self.services.host.upsert_style(&id, &css);
        }
    }

    fn apply_listeners(&self, instance: &Arc<FeatureInstance>) {
        self.observe_listener.add_feature(instance.clone());
        self.route_listener.add_feature(instance.clone());
    }

    fn remove_listeners(&self, instance: &FeatureInstance) {
        self.observe_listener.remove_feature(instance.name());
        self.route_listener.remove_feature(instance.name());
    }

    /// Activate every enabled feature, each as its own task.
    ///
    /// Returns the number of features activated.
    pub async fn invoke_feature_instances(&self) -> usize {
        let mut tasks = Vec::new();

        for instance in self.instances() {
            if !instance.is_enabled() {
                tracing::debug!("Feature {} is disabled", instance.name());
                continue;
            }

            self.apply_listeners(&instance);
            tasks.push(tokio::spawn(async move {
                instance.will_invoke().await;
                if instance.should_invoke() {
                    instance.invoke();
                }
            }));
        }

        let mut activated = 0;
        for result in futures::future::join_all(tasks).await {
            match result {
                Ok(()) => activated += 1,
                Err(e) => tracing::warn!("Feature activation task failed: {}", e),
            }
        }
        activated
    }

    /// Run `should_invoke`/`invoke` for one feature if it is enabled.
    ///
    /// Returns whether `invoke` completed.
    pub fn invoke_feature(&self, instance: &FeatureInstance) -> bool {
        instance.is_enabled() && instance.should_invoke() && instance.invoke()
    }

    /// Remove every side effect of a feature and call its `destroy`.
    pub fn destroy_feature(&self, instance: &FeatureInstance) {
        let id = self.config.feature_style_id(instance.name().as_str());
        self.services.host.remove_style(&id);
        self.remove_listeners(instance);
        instance.remove_hooks();
        instance.destroy();
    }

    /// Re-fire every lifecycle hook on every rendered instance of every hooked component.
    ///
    /// Returns the number of callbacks that ran.
    pub fn invoke_all_hooks(&self) -> usize {
        let mut fired = 0;
        for key in self.services.hooks.hooked_components() {
            for instance in self.services.host.rendered_components(&key) {
                match self.dispatcher.replay(&instance) {
                    Ok(count) => fired += count,
                    Err(e) => tracing::warn!("Hook replay failed: {}", e),
                }
            }
        }
        tracing::debug!("Replayed {} hooks", fired);
        fired
    }

    /// Forward an in-app navigation to subscribed features.
    pub fn notify_route_changed(&self, route: &Route) -> usize {
        self.route_listener.emit(route)
    }

    /// Forward a host state mutation to subscribed features.
    pub fn notify_observed(&self, changed: &[String]) -> usize {
        self.observe_listener.emit(changed)
    }

    /// Feature instances in declaration order.
    pub fn instances(&self) -> Vec<Arc<FeatureInstance>> {
        self.instances.read().values().cloned().collect()
    }

    pub fn feature(&self, name: &str) -> Option<Arc<FeatureInstance>> {
        self.instances.read().get(name).cloned()
    }

    pub fn feature_names(&self) -> Vec<FeatureName> {
        self.instances.read().keys().copied().collect()
    }

    pub fn feature_setting(&self, name: &str) -> Option<FeatureSetting> {
        self.feature(name).and_then(|instance| instance.setting())
    }

    pub fn is_loaded(&self) -> bool {
        *self.loaded.borrow()
    }

    /// Wait until setup is done and the first activation pass has started.
    pub async fn wait_until_loaded(&self) {
        let mut loaded = self.loaded.subscribe();
        // The sender lives as long as `self`.
        let _ = loaded.wait_for(|loaded| *loaded).await;
    }

    /// Features activated by the first pass, or `None` while it is running.
    pub fn activated_count(&self) -> Option<usize> {
        *self.activated.borrow()
    }

    /// Wait until every task of the first activation pass has joined.
    pub async fn wait_until_activated(&self) -> usize {
        let mut activated = self.activated.subscribe();
        match activated.wait_for(Option::is_some).await {
            Ok(count) => (*count).unwrap_or_default(),
            Err(_) => 0,
        }
    }

    pub fn hooked_components(&self) -> Vec<ComponentKey> {
        self.services.hooks.hooked_components()
    }

    pub fn hook_registry(&self) -> &Arc<HookRegistry> {
        &self.services.hooks
    }

    pub fn observe_listener(&self) -> &ObserveListener {
        &self.observe_listener
    }

    pub fn route_listener(&self) -> &RouteChangeListener {
        &self.route_listener
    }

    pub fn state(&self) -> &Arc<ToolkitState> {
        &self.services.state
    }

    pub fn config(&self) -> &ToolkitConfig {
        &self.config
    }
}
