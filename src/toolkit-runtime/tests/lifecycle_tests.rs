//! Integration tests for the feature lifecycle: bootstrap → ready → activate → enable/disable.
//!
//! Tests the orchestrator end to end against the in-memory host:
//! - Instance construction and activation
//! - Enable/disable transitions driven by setting changes
//! - Error isolation between features
//! - Lifecycle hook dispatch and delayed replay
//! - Master switch, message source filtering and global errors

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use toolkit_runtime::{
    BootstrapPayload, ComponentInstance, Envelope, Environment, Feature, FeatureCatalog,
    FeatureContext, FeatureFunction, FeatureName, FeatureSetting, InboundMessage, LifecycleEvent,
    MemoryErrorReporter, MemoryHost, MemorySettingsStore, MessageOutcome, MessageSource,
    OutboundMessage, Route, SettingsStore, Toolkit, ToolkitConfig, ToolkitError, UncaughtError,
    message_channel,
};

// =============================================================================
// Probe Feature
// =============================================================================

#[derive(Default)]
struct Calls {
    will_invoke: AtomicUsize,
    invoke: AtomicUsize,
    destroy: AtomicUsize,
    hook_elements: Mutex<Vec<String>>,
    routes: Mutex<Vec<String>>,
}

/// Feature that records every call made into it.
struct Probe {
    name: &'static str,
    should_invoke: bool,
    css: &'static str,
    fail_css: bool,
    hook_component: Option<&'static str>,
    fail_will_invoke: bool,
    stall_will_invoke: bool,
    fail_invoke: bool,
    panic_invoke: bool,
    fail_hook: bool,
    calls: Arc<Calls>,
}

impl Probe {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            should_invoke: true,
            css: "",
            fail_css: false,
            hook_component: None,
            fail_will_invoke: false,
            stall_will_invoke: false,
            fail_invoke: false,
            panic_invoke: false,
            fail_hook: false,
            calls: Arc::new(Calls::default()),
        }
    }

    fn css(mut self, css: &'static str) -> Self {
        self.css = css;
        self
    }

    fn failing_css(mut self) -> Self {
        self.fail_css = true;
        self
    }

    fn hook(mut self, component: &'static str) -> Self {
        self.hook_component = Some(component);
        self
    }

    fn never_invoke(mut self) -> Self {
        self.should_invoke = false;
        self
    }

    fn failing_will_invoke(mut self) -> Self {
        self.fail_will_invoke = true;
        self
    }

    fn stalled_will_invoke(mut self) -> Self {
        self.stall_will_invoke = true;
        self
    }

    fn failing_invoke(mut self) -> Self {
        self.fail_invoke = true;
        self
    }

    fn panicking_invoke(mut self) -> Self {
        self.panic_invoke = true;
        self
    }

    fn failing_hook(mut self) -> Self {
        self.fail_hook = true;
        self
    }

    fn invokes(&self) -> usize {
        self.calls.invoke.load(Ordering::SeqCst)
    }

    fn destroys(&self) -> usize {
        self.calls.destroy.load(Ordering::SeqCst)
    }

    fn hook_elements(&self) -> Vec<String> {
        self.calls.hook_elements.lock().clone()
    }
}

#[async_trait]
impl Feature for Probe {
    fn name(&self) -> FeatureName {
        FeatureName::new(self.name)
    }

    fn should_invoke(&self, _ctx: &FeatureContext) -> anyhow::Result<bool> {
        Ok(self.should_invoke)
    }

    async fn will_invoke(&self, _ctx: &FeatureContext) -> anyhow::Result<()> {
        self.calls.will_invoke.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.stall_will_invoke {
            std::future::pending::<()>().await;
        }
        if self.fail_will_invoke {
            anyhow::bail!("settings unavailable");
        }
        Ok(())
    }

    fn invoke(&self, ctx: &FeatureContext) -> anyhow::Result<()> {
        self.calls.invoke.fetch_add(1, Ordering::SeqCst);
        if self.panic_invoke {
            panic!("index out of bounds");
        }
        if self.fail_invoke {
            anyhow::bail!("column layout not found");
        }

        if let Some(component) = self.hook_component {
            let calls = self.calls.clone();
            let fail = self.fail_hook;
            ctx.add_hook(component, LifecycleEvent::Rendered, move |element| {
                calls.hook_elements.lock().push(element.id.clone());
                if fail {
                    anyhow::bail!("cell missing");
                }
                Ok(())
            });
        }
        Ok(())
    }

    fn destroy(&self, _ctx: &FeatureContext) -> anyhow::Result<()> {
        self.calls.destroy.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn inject_css(&self, _ctx: &FeatureContext) -> anyhow::Result<String> {
        if self.fail_css {
            anyhow::bail!("theme variables missing");
        }
        Ok(self.css.to_string())
    }

    fn on_route_changed(&self, _ctx: &FeatureContext, route: &Route) -> anyhow::Result<()> {
        self.calls.routes.lock().push(route.path.clone());
        Ok(())
    }

    fn on_budget_changed(&self, _ctx: &FeatureContext, budget_id: &str) -> anyhow::Result<()> {
        self.calls.routes.lock().push(format!("budget:{budget_id}"));
        Ok(())
    }
}

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    toolkit: Arc<Toolkit>,
    host: Arc<MemoryHost>,
    reporter: Arc<MemoryErrorReporter>,
    storage: Arc<MemorySettingsStore>,
}

fn test_config() -> ToolkitConfig {
    ToolkitConfig {
        poll_interval_ms: 1,
        max_poll_attempts: Some(2_000),
        hook_replay_delay_ms: 5,
        ..ToolkitConfig::default()
    }
}

fn harness(probes: &[Arc<Probe>]) -> Harness {
    let mut catalog = FeatureCatalog::new();
    for probe in probes {
        let probe = probe.clone();
        catalog
            .declare(move || -> Arc<dyn Feature> { probe.clone() })
            .unwrap();
    }

    let host = Arc::new(MemoryHost::new());
    let reporter = Arc::new(MemoryErrorReporter::new());
    let storage = Arc::new(MemorySettingsStore::new());
    let toolkit = Toolkit::new(
        test_config(),
        catalog,
        host.clone(),
        storage.clone(),
        reporter.clone(),
    );

    Harness {
        toolkit,
        host,
        reporter,
        storage,
    }
}

fn bootstrap_payload(options: &[(&str, FeatureSetting)]) -> BootstrapPayload {
    BootstrapPayload {
        options: options
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect(),
        environment: Environment::Beta,
        version: "3.1.0".to_string(),
        extension_id: "ext-abc123".to_string(),
        name: "Toolkit".to_string(),
    }
}

fn bootstrap(options: &[(&str, FeatureSetting)]) -> Envelope {
    Envelope::same_window(InboundMessage::Bootstrap {
        toolkit: bootstrap_payload(options),
    })
}

fn setting(name: &str, value: impl Into<FeatureSetting>) -> Envelope {
    Envelope::same_window(InboundMessage::setting_changed(name, value))
}

async fn wait_loaded(toolkit: &Toolkit) {
    tokio::time::timeout(Duration::from_secs(5), toolkit.wait_until_loaded())
        .await
        .expect("toolkit did not load");
}

/// Wait for load and for every task of the first activation pass.
async fn wait_activated(toolkit: &Toolkit) {
    wait_loaded(toolkit).await;
    tokio::time::timeout(Duration::from_secs(5), toolkit.wait_until_activated())
        .await
        .expect("activation pass did not finish");
}

/// Bootstrap with a ready host and wait for the first activation pass.
async fn start(h: &Harness, options: &[(&str, FeatureSetting)]) {
    h.host.set_ready(true);
    assert_eq!(
        h.toolkit.on_background_message(bootstrap(options)),
        MessageOutcome::Bootstrapped
    );
    wait_activated(&h.toolkit).await;
}

fn style_id(name: &str) -> String {
    format!("tk-feature-styles-{name}")
}

// =============================================================================
// Bootstrap
// =============================================================================

#[tokio::test]
async fn test_one_instance_per_declared_feature() {
    let a = Arc::new(Probe::new("A"));
    let b = Arc::new(Probe::new("B"));
    let c = Arc::new(Probe::new("C"));
    let h = harness(&[a.clone(), b.clone(), c.clone()]);

    start(&h, &[("A", "1".into()), ("B", false.into())]).await;

    let names: Vec<&str> = h
        .toolkit
        .feature_names()
        .iter()
        .map(FeatureName::as_str)
        .collect();
    assert_eq!(names, vec!["A", "B", "C"]);
    assert_eq!(h.toolkit.feature_setting("A"), Some(FeatureSetting::from("1")));
    assert_eq!(h.toolkit.feature_setting("B"), Some(FeatureSetting::Bool(false)));
    assert_eq!(h.toolkit.feature_setting("C"), None);

    assert_eq!(a.invokes(), 1);
    assert_eq!(b.invokes(), 0);
    assert_eq!(c.invokes(), 0);
}

#[tokio::test]
async fn test_repeated_bootstrap_is_ignored() {
    let a = Arc::new(Probe::new("A"));
    let h = harness(&[a.clone()]);

    start(&h, &[("A", true.into())]).await;

    let outcome = h.toolkit.on_background_message(bootstrap(&[("A", false.into())]));
    assert_eq!(outcome, MessageOutcome::AlreadyBootstrapped);
    assert_eq!(h.toolkit.feature_names().len(), 1);
    assert_eq!(h.toolkit.feature_setting("A"), Some(FeatureSetting::Bool(true)));
    assert_eq!(a.invokes(), 1);
}

#[tokio::test]
async fn test_foreign_messages_are_ignored() {
    let h = harness(&[Arc::new(Probe::new("A"))]);

    let outcome = h.toolkit.on_background_message(Envelope {
        source: MessageSource::Foreign("https://ads.example".to_string()),
        message: InboundMessage::Bootstrap {
            toolkit: bootstrap_payload(&[("A", true.into())]),
        },
    });

    assert_eq!(outcome, MessageOutcome::ForeignSource);
    assert!(!h.toolkit.state().is_bootstrapped());
    assert!(h.toolkit.feature_names().is_empty());
}

#[tokio::test]
async fn test_features_wait_for_host_ready() {
    let a = Arc::new(Probe::new("A").css(".a{}"));
    let h = harness(&[a.clone()]);

    h.toolkit
        .on_background_message(bootstrap(&[("A", true.into())]));
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(!h.toolkit.is_loaded());
    assert_eq!(a.invokes(), 0);
    assert_eq!(h.host.dispatcher_installs(), 0);
    assert!(h.host.styles().is_empty());

    h.host.set_ready(true);
    wait_activated(&h.toolkit).await;

    assert_eq!(a.invokes(), 1);
    assert_eq!(h.host.dispatcher_installs(), 1);
    assert!(h.host.has_style(&style_id("A")));
    assert!(h.host.has_style("tk-global-styles"));
}

#[tokio::test]
async fn test_initialize_announces_once() {
    let h = harness(&[Arc::new(Probe::new("A"))]);
    let (_sender, receiver) = message_channel();
    let (_other_sender, other_receiver) = message_channel();

    h.toolkit.initialize(receiver).unwrap();
    let second = h.toolkit.initialize(other_receiver);

    assert!(matches!(second, Err(ToolkitError::AlreadyInitialized)));
    assert_eq!(h.host.outbox(), vec![OutboundMessage::ToolkitLoaded]);
}

#[tokio::test]
async fn test_bootstrap_over_message_channel() {
    let a = Arc::new(Probe::new("A"));
    let h = harness(&[a.clone()]);
    let (sender, receiver) = message_channel();
    h.toolkit.initialize(receiver).unwrap();

    h.host.set_ready(true);
    sender
        .send_json(
            MessageSource::SameWindow,
            r#"{
                "type": "toolkit-bootstrap",
                "toolkit": {
                    "options": {"A": "1"},
                    "environment": "production",
                    "version": "3.1.0",
                    "extensionId": "ext-abc123"
                }
            }"#,
        )
        .unwrap();
    wait_activated(&h.toolkit).await;
    assert_eq!(a.invokes(), 1);

    sender.send(InboundMessage::setting_changed("A", false)).unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while a.destroys() == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("setting change was not handled");
    assert_eq!(h.toolkit.feature_setting("A"), Some(FeatureSetting::Bool(false)));
}

// =============================================================================
// Activation
// =============================================================================

#[tokio::test]
async fn test_should_invoke_false_skips_invoke() {
    let a = Arc::new(Probe::new("A").never_invoke());
    let h = harness(&[a.clone()]);

    start(&h, &[("A", true.into())]).await;
    assert_eq!(a.invokes(), 0);
    assert_eq!(a.calls.will_invoke.load(Ordering::SeqCst), 1);

    h.toolkit.on_background_message(setting("A", false));
    let outcome = h.toolkit.on_background_message(setting("A", true));
    assert_eq!(outcome, MessageOutcome::Enabled(FeatureName::new("A")));
    assert_eq!(a.invokes(), 0);
}

#[tokio::test]
async fn test_bootstrap_scenario_only_enabled_feature_runs() {
    let a = Arc::new(Probe::new("A").css(".a { color: red; }"));
    let b = Arc::new(Probe::new("B").css(".b { color: blue; }"));
    let h = harness(&[a.clone(), b.clone()]);

    start(&h, &[("A", "1".into()), ("B", false.into())]).await;

    assert_eq!(a.invokes(), 1);
    assert_eq!(b.invokes(), 0);

    let styles = h.host.styles();
    assert_eq!(
        styles.get(&style_id("A")).map(String::as_str),
        Some(".a { color: red; }")
    );
    assert!(!styles.contains_key(&style_id("B")));
    assert!(h.toolkit.is_loaded());
}

#[tokio::test]
async fn test_empty_css_inserts_no_style() {
    let a = Arc::new(Probe::new("A"));
    let h = harness(&[a.clone()]);

    start(&h, &[("A", true.into())]).await;

    assert!(!h.host.has_style(&style_id("A")));
}

#[tokio::test]
async fn test_failing_css_leaves_no_style() {
    let a = Arc::new(Probe::new("A").css(".a { color: red; }").failing_css());
    let h = harness(&[a.clone()]);

    start(&h, &[("A", true.into())]).await;

    assert!(!h.host.has_style(&style_id("A")));
    assert_eq!(a.invokes(), 1);
    let reports = h.reporter.reports_for("A");
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].function_name, Some(FeatureFunction::InjectCss));
}

#[tokio::test]
async fn test_failing_invoke_does_not_block_others() {
    let broken = Arc::new(Probe::new("Broken").failing_invoke());
    let panicking = Arc::new(Probe::new("Panicking").panicking_invoke());
    let a = Arc::new(Probe::new("A"));
    let h = harness(&[broken.clone(), panicking.clone(), a.clone()]);

    start(
        &h,
        &[
            ("Broken", true.into()),
            ("Panicking", true.into()),
            ("A", true.into()),
        ],
    )
    .await;

    assert_eq!(a.invokes(), 1);
    assert_eq!(broken.invokes(), 1);
    assert_eq!(panicking.invokes(), 1);

    let broken_reports = h.reporter.reports_for("Broken");
    assert_eq!(broken_reports.len(), 1);
    assert_eq!(broken_reports[0].function_name, Some(FeatureFunction::Invoke));
    assert_eq!(broken_reports[0].feature_setting, Some(FeatureSetting::Bool(true)));
    assert!(broken_reports[0].exception.contains("column layout not found"));

    let panic_reports = h.reporter.reports_for("Panicking");
    assert_eq!(panic_reports.len(), 1);
    assert!(panic_reports[0].exception.contains("index out of bounds"));

    assert!(h.reporter.reports_for("A").is_empty());
}

#[tokio::test]
async fn test_failing_will_invoke_still_invokes() {
    let a = Arc::new(Probe::new("A").failing_will_invoke());
    let h = harness(&[a.clone()]);

    start(&h, &[("A", true.into())]).await;

    assert_eq!(a.invokes(), 1);
    let reports = h.reporter.reports_for("A");
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].function_name, Some(FeatureFunction::WillInvoke));
}

#[tokio::test]
async fn test_default_invoke_is_reported() {
    struct NoLogic;

    impl Feature for NoLogic {
        fn name(&self) -> FeatureName {
            FeatureName::new("NoLogic")
        }

        fn should_invoke(&self, _ctx: &FeatureContext) -> anyhow::Result<bool> {
            Ok(true)
        }
    }

    let catalog = FeatureCatalog::new().with(|| Arc::new(NoLogic)).unwrap();
    let host = Arc::new(MemoryHost::new());
    let reporter = Arc::new(MemoryErrorReporter::new());
    let toolkit = Toolkit::new(
        test_config(),
        catalog,
        host.clone(),
        Arc::new(MemorySettingsStore::new()),
        reporter.clone(),
    );

    host.set_ready(true);
    toolkit.on_background_message(bootstrap(&[("NoLogic", true.into())]));
    wait_activated(&toolkit).await;

    let reports = reporter.reports_for("NoLogic");
    assert_eq!(reports.len(), 1);
    assert!(
        reports[0]
            .exception
            .contains("does not implement required invoke() method")
    );
}

// =============================================================================
// Enable / Disable
// =============================================================================

#[tokio::test]
async fn test_disable_removes_side_effects() {
    let a = Arc::new(Probe::new("A").css(".a{}").hook("register-row"));
    let h = harness(&[a.clone()]);
    let name = FeatureName::new("A");

    start(&h, &[("A", "1".into())]).await;

    assert!(h.host.has_style(&style_id("A")));
    assert_eq!(h.toolkit.hook_registry().feature_hook_count(name), 1);
    assert!(h.toolkit.observe_listener().contains(name));
    assert!(h.toolkit.route_listener().contains(name));

    let outcome = h.toolkit.on_background_message(setting("A", false));

    assert_eq!(outcome, MessageOutcome::Disabled(name));
    assert!(!h.host.has_style(&style_id("A")));
    assert_eq!(h.toolkit.hook_registry().feature_hook_count(name), 0);
    assert!(!h.toolkit.observe_listener().contains(name));
    assert!(!h.toolkit.route_listener().contains(name));
    assert_eq!(a.destroys(), 1);

    // The instance survives with its new setting.
    assert_eq!(h.toolkit.feature_names(), vec![name]);
    assert_eq!(h.toolkit.feature_setting("A"), Some(FeatureSetting::Bool(false)));
}

#[tokio::test]
async fn test_disabled_variant_sentinel_disables() {
    let a = Arc::new(Probe::new("A").css(".a{}"));
    let h = harness(&[a.clone()]);

    start(&h, &[("A", "2".into())]).await;
    let outcome = h.toolkit.on_background_message(setting("A", "0"));

    assert_eq!(outcome, MessageOutcome::Disabled(FeatureName::new("A")));
    assert!(!h.host.has_style(&style_id("A")));
    assert_eq!(a.destroys(), 1);
}

#[tokio::test]
async fn test_enable_disable_enable_is_idempotent() {
    let a = Arc::new(Probe::new("A").css(".a{}").hook("register-row"));
    let h = harness(&[a.clone()]);
    let name = FeatureName::new("A");

    start(&h, &[("A", true.into())]).await;
    let styles_after_first = h.host.styles();

    h.toolkit.on_background_message(setting("A", false));
    let outcome = h.toolkit.on_background_message(setting("A", true));

    assert_eq!(outcome, MessageOutcome::Enabled(name));
    assert_eq!(a.invokes(), 2);
    assert_eq!(a.destroys(), 1);
    assert_eq!(h.host.styles(), styles_after_first);
    assert_eq!(h.toolkit.hook_registry().feature_hook_count(name), 1);
    assert!(h.toolkit.observe_listener().contains(name));
    assert!(h.toolkit.route_listener().contains(name));
    assert_eq!(h.toolkit.observe_listener().len(), 1);
}

#[tokio::test]
async fn test_enable_feature_disabled_at_bootstrap() {
    let b = Arc::new(Probe::new("B").css(".b{}"));
    let h = harness(&[b.clone()]);

    start(&h, &[("B", false.into())]).await;
    assert_eq!(b.invokes(), 0);
    assert!(!h.toolkit.observe_listener().contains(FeatureName::new("B")));

    h.toolkit.on_background_message(setting("B", "1"));

    assert_eq!(b.invokes(), 1);
    assert!(h.host.has_style(&style_id("B")));
    assert!(h.toolkit.observe_listener().contains(FeatureName::new("B")));
}

#[tokio::test]
async fn test_unknown_setting_is_ignored() {
    let a = Arc::new(Probe::new("A"));
    let h = harness(&[a.clone()]);

    start(&h, &[("A", true.into())]).await;
    let outcome = h.toolkit.on_background_message(setting("NotAFeature", false));

    assert_eq!(
        outcome,
        MessageOutcome::UnknownFeature("NotAFeature".to_string())
    );
    assert_eq!(a.destroys(), 0);
    assert!(h.reporter.reports().is_empty());
    assert_eq!(
        h.toolkit.state().option("NotAFeature"),
        Some(FeatureSetting::Bool(false))
    );
}

// =============================================================================
// Master Switch
// =============================================================================

#[tokio::test]
async fn test_master_switch_on_reloads_only() {
    let a = Arc::new(Probe::new("A").css(".a{}").hook("register-row"));
    let h = harness(&[a.clone()]);

    start(&h, &[("A", true.into()), ("DisableToolkit", false.into())]).await;
    let styles = h.host.styles();

    let outcome = h.toolkit.on_background_message(setting("DisableToolkit", true));

    assert_eq!(outcome, MessageOutcome::Reloaded);
    assert_eq!(h.host.reload_count(), 1);
    assert_eq!(a.destroys(), 0);
    assert_eq!(a.invokes(), 1);
    assert_eq!(h.host.styles(), styles);
    assert_eq!(
        h.toolkit.hook_registry().feature_hook_count(FeatureName::new("A")),
        1
    );
}

#[tokio::test]
async fn test_master_switch_off_does_not_reload() {
    let h = harness(&[Arc::new(Probe::new("A"))]);

    start(&h, &[("A", true.into())]).await;
    h.toolkit.on_background_message(setting("DisableToolkit", false));

    assert_eq!(h.host.reload_count(), 0);
    assert!(!h.toolkit.state().is_option_enabled("DisableToolkit"));
}

#[tokio::test]
async fn test_disabled_toolkit_runs_nothing() {
    let a = Arc::new(Probe::new("A").css(".a{}"));
    let h = harness(&[a.clone()]);

    h.host.set_ready(true);
    h.toolkit
        .on_background_message(bootstrap(&[("A", true.into()), ("DisableToolkit", true.into())]));
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert_eq!(h.host.dispatcher_installs(), 1);
    assert!(!h.toolkit.is_loaded());
    assert_eq!(a.invokes(), 0);
    assert!(h.host.styles().is_empty());
    // One instance per feature even when nothing runs.
    assert_eq!(h.toolkit.feature_names(), vec![FeatureName::new("A")]);
}

// =============================================================================
// Hooks
// =============================================================================

#[tokio::test]
async fn test_hook_fires_once_per_firing_with_root_element() {
    let a = Arc::new(Probe::new("A").hook("X"));
    let h = harness(&[a.clone()]);

    start(&h, &[("A", "1".into())]).await;
    // Let the delayed replay pass over the (empty) set of rendered instances.
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(a.hook_elements().is_empty());

    let instance = ComponentInstance::new("X", "x-root-1");
    assert_eq!(h.host.fire(LifecycleEvent::Rendered, &instance).unwrap(), 1);
    assert_eq!(a.hook_elements(), vec!["x-root-1".to_string()]);

    h.host.fire(LifecycleEvent::Rendered, &instance).unwrap();
    assert_eq!(
        a.hook_elements(),
        vec!["x-root-1".to_string(), "x-root-1".to_string()]
    );

    // Other events and other components do not reach the hook.
    h.host.fire(LifecycleEvent::Inserted, &instance).unwrap();
    h.host
        .fire(LifecycleEvent::Rendered, &ComponentInstance::new("Y", "y-1"))
        .unwrap();
    assert_eq!(a.hook_elements().len(), 2);
    assert_eq!(
        h.toolkit.hooked_components(),
        vec![toolkit_runtime::ComponentKey::new("X")]
    );
}

#[tokio::test]
async fn test_hooks_fire_in_registration_order() {
    let order = Arc::new(Mutex::new(Vec::new()));

    struct Ordered {
        order: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Feature for Ordered {
        fn name(&self) -> FeatureName {
            FeatureName::new("A")
        }

        fn should_invoke(&self, _ctx: &FeatureContext) -> anyhow::Result<bool> {
            Ok(true)
        }

        fn invoke(&self, ctx: &FeatureContext) -> anyhow::Result<()> {
            let first = self.order.clone();
            ctx.add_hook("X", LifecycleEvent::Rendered, move |_| {
                first.lock().push("first");
                Ok(())
            });
            let second = self.order.clone();
            ctx.add_hook("X", LifecycleEvent::Rendered, move |_| {
                second.lock().push("second");
                Ok(())
            });
            Ok(())
        }
    }

    let sink = order.clone();
    let catalog = FeatureCatalog::new()
        .with(move || {
            Arc::new(Ordered {
                order: sink.clone(),
            })
        })
        .unwrap();
    let host = Arc::new(MemoryHost::new());
    let toolkit = Toolkit::new(
        test_config(),
        catalog,
        host.clone(),
        Arc::new(MemorySettingsStore::new()),
        Arc::new(MemoryErrorReporter::new()),
    );

    host.set_ready(true);
    toolkit.on_background_message(bootstrap(&[("A", true.into())]));
    wait_activated(&toolkit).await;
    tokio::time::sleep(Duration::from_millis(30)).await;

    host.fire(LifecycleEvent::Rendered, &ComponentInstance::new("X", "x1"))
        .unwrap();
    assert_eq!(*order.lock(), vec!["first", "second"]);
}

#[tokio::test]
async fn test_replay_reaches_components_rendered_before_ready() {
    let a = Arc::new(Probe::new("A").hook("register-row"));
    let h = harness(&[a.clone()]);

    // Rendered before the dispatcher exists: nothing fires.
    assert_eq!(h.host.render("register-row", "row-1").unwrap(), 0);

    start(&h, &[("A", true.into())]).await;
    tokio::time::timeout(Duration::from_secs(5), async {
        while a.hook_elements().is_empty() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("hooks were not replayed");

    assert_eq!(a.hook_elements(), vec!["row-1".to_string()]);
    assert_eq!(h.toolkit.invoke_all_hooks(), 1);
    assert_eq!(a.hook_elements().len(), 2);
}

#[tokio::test]
async fn test_stalled_feature_does_not_hold_back_replay() {
    let stalled = Arc::new(Probe::new("Stalled").stalled_will_invoke());
    let a = Arc::new(Probe::new("A").hook("X"));
    let h = harness(&[stalled.clone(), a.clone()]);

    assert_eq!(h.host.render("X", "row-1").unwrap(), 0);
    h.host.set_ready(true);
    h.toolkit
        .on_background_message(bootstrap(&[("Stalled", true.into()), ("A", true.into())]));

    wait_loaded(&h.toolkit).await;
    tokio::time::timeout(Duration::from_secs(5), async {
        while a.hook_elements().is_empty() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("hooks were not replayed");

    assert_eq!(a.hook_elements(), vec!["row-1".to_string()]);
    assert_eq!(a.invokes(), 1);
    assert_eq!(stalled.invokes(), 0);
    assert!(h.toolkit.is_loaded());
    assert_eq!(h.toolkit.activated_count(), None);
}

#[tokio::test]
async fn test_activated_count_after_pass() {
    let a = Arc::new(Probe::new("A"));
    let b = Arc::new(Probe::new("B"));
    let h = harness(&[a.clone(), b.clone()]);

    start(&h, &[("A", true.into()), ("B", false.into())]).await;

    assert_eq!(h.toolkit.activated_count(), Some(1));
}

#[tokio::test]
async fn test_hook_error_propagates_to_host() {
    let a = Arc::new(Probe::new("A").hook("X").failing_hook());
    let h = harness(&[a.clone()]);

    start(&h, &[("A", true.into())]).await;
    tokio::time::sleep(Duration::from_millis(30)).await;

    let result = h
        .host
        .fire(LifecycleEvent::Rendered, &ComponentInstance::new("X", "x1"));

    match result {
        Err(ToolkitError::Hook {
            feature,
            component,
            event,
            message,
        }) => {
            assert_eq!(feature, "A");
            assert_eq!(component, "X");
            assert_eq!(event, "rendered");
            assert!(message.contains("cell missing"));
        }
        other => panic!("expected hook error, got {other:?}"),
    }
    // Not isolated, so nothing is reported.
    assert!(h.reporter.reports().is_empty());
}

// =============================================================================
// Listeners
// =============================================================================

#[tokio::test]
async fn test_route_changes_reach_enabled_features() {
    let a = Arc::new(Probe::new("A"));
    let b = Arc::new(Probe::new("B"));
    let h = harness(&[a.clone(), b.clone()]);

    start(&h, &[("A", true.into()), ("B", false.into())]).await;

    let notified = h
        .toolkit
        .notify_route_changed(&Route::new("/budget/b1").with_budget("b1"));
    assert_eq!(notified, 1);
    assert_eq!(
        *a.calls.routes.lock(),
        vec!["budget:b1".to_string(), "/budget/b1".to_string()]
    );
    assert!(b.calls.routes.lock().is_empty());

    h.toolkit.on_background_message(setting("A", false));
    assert_eq!(h.toolkit.notify_route_changed(&Route::new("/reports")), 0);
}

// =============================================================================
// Global Errors And Release Notice
// =============================================================================

#[tokio::test]
async fn test_uncaught_errors_filtered_by_extension_id() {
    let h = harness(&[Arc::new(Probe::new("A"))]);

    start(&h, &[("A", true.into())]).await;

    h.host
        .raise_uncaught(&UncaughtError::new("ReferenceError: ynab is not defined"));
    h.host.raise_uncaught(
        &UncaughtError::new("TypeError: cannot read property")
            .with_stack("at chrome-extension://ext-abc123/web-accessibles/toolkit.js:10:5"),
    );

    let reports = h.reporter.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].feature_name, "unknown");
    assert_eq!(reports[0].feature_setting, Some(FeatureSetting::from("unknown")));
    assert_eq!(reports[0].function_name, Some(FeatureFunction::Global));
}

#[tokio::test]
async fn test_release_notice_after_upgrade() {
    let h = harness(&[Arc::new(Probe::new("A"))]);
    h.storage
        .set_key("latest-version-beta", "3.0.2")
        .await
        .unwrap();

    start(&h, &[("A", true.into())]).await;

    assert_eq!(h.host.release_notices(), vec!["3.1.0".to_string()]);
    assert_eq!(
        h.storage.get_key("latest-version-beta").await.unwrap().as_deref(),
        Some("3.1.0")
    );
}
