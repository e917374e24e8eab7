//! Scripted host sessions.
//!
//! A scenario is a TOML file with the bootstrap payload and a list of host
//! actions. [`ScenarioRunner`] plays it against a [`Toolkit`] attached to a
//! [`MemoryHost`] and collects what happened.
//!
//! ```toml
//! [bootstrap]
//! environment = "beta"
//! version = "3.1.0"
//! extensionId = "abc123"
//!
//! [bootstrap.options]
//! CheckNumbers = "1"
//!
//! [[steps]]
//! action = "ready"
//!
//! [[steps]]
//! action = "wait_activated"
//!
//! [[steps]]
//! action = "render"
//! component = "register-row"
//! element = "row-1"
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::Result;
use crate::feature::FeatureSetting;
use crate::hooks::ComponentKey;
use crate::host::{HostSnapshot, MemoryHost};
use crate::listeners::Route;
use crate::messages::{Envelope, InboundMessage};
use crate::report::{ErrorReport, MemoryErrorReporter, UncaughtError};
use crate::state::BootstrapPayload;
use crate::toolkit::{MessageOutcome, Toolkit};

/// A scripted session.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub bootstrap: BootstrapPayload,
    #[serde(default)]
    pub steps: Vec<ScenarioStep>,
}

/// One host action.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScenarioStep {
    /// The host finished bootstrapping
    Ready,
    /// Mount a component instance
    Render { component: String, element: String },
    /// Re-render a mounted component instance
    Update { component: String, element: String },
    /// A setting changed in the privileged context
    Setting { name: String, value: FeatureSetting },
    /// In-app navigation
    Route {
        path: String,
        #[serde(default)]
        budget_id: Option<String>,
    },
    /// Host state mutated
    Observe { changed: Vec<String> },
    /// An uncaught error surfaced in the page
    RaiseError {
        message: String,
        #[serde(default)]
        stack: Option<String>,
    },
    /// Sleep
    Wait { ms: u64 },
    /// Wait for setup to finish and the first activation pass to start
    WaitLoaded {
        #[serde(default = "default_wait_loaded_ms")]
        timeout_ms: u64,
    },
    /// Wait for every feature of the first activation pass
    WaitActivated {
        #[serde(default = "default_wait_loaded_ms")]
        timeout_ms: u64,
    },
}

fn default_wait_loaded_ms() -> u64 {
    5_000
}

impl Scenario {
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

/// State of a feature at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSummary {
    pub setting: Option<FeatureSetting>,
    pub enabled: bool,
    pub hooks: usize,
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub outcomes: Vec<MessageOutcome>,
    pub hook_errors: Vec<String>,
    pub loaded: bool,
    pub activated: Option<usize>,
    pub features: IndexMap<String, FeatureSummary>,
    pub hooked_components: Vec<ComponentKey>,
    pub host: HostSnapshot,
    pub errors: Vec<ErrorReport>,
}

/// Plays scenarios against a toolkit attached to a memory host.
pub struct ScenarioRunner {
    toolkit: Arc<Toolkit>,
    host: Arc<MemoryHost>,
    reporter: Arc<MemoryErrorReporter>,
}

impl ScenarioRunner {
    pub fn new(
        toolkit: Arc<Toolkit>,
        host: Arc<MemoryHost>,
        reporter: Arc<MemoryErrorReporter>,
    ) -> Self {
        Self {
            toolkit,
            host,
            reporter,
        }
    }

    pub async fn run(&self, scenario: &Scenario) -> ScenarioReport {
        let mut outcomes = Vec::new();
        let mut hook_errors = Vec::new();

        outcomes.push(self.deliver(InboundMessage::Bootstrap {
            toolkit: scenario.bootstrap.clone(),
        }));

        for step in &scenario.steps {
            tracing::debug!("Scenario step: {:?}", step);
            match step {
                ScenarioStep::Ready => self.host.set_ready(true),
                ScenarioStep::Render { component, element } => {
                    if let Err(e) = self.host.render(component, element) {
                        hook_errors.push(e.to_string());
                    }
                }
                ScenarioStep::Update { component, element } => {
                    if let Err(e) = self.host.rerender(component, element) {
                        hook_errors.push(e.to_string());
                    }
                }
                ScenarioStep::Setting { name, value } => {
                    outcomes.push(
                        self.deliver(InboundMessage::setting_changed(name.clone(), value.clone())),
                    );
                }
                ScenarioStep::Route { path, budget_id } => {
                    let route = Route {
                        path: path.clone(),
                        budget_id: budget_id.clone(),
                    };
                    self.toolkit.notify_route_changed(&route);
                }
                ScenarioStep::Observe { changed } => {
                    self.toolkit.notify_observed(changed);
                }
                ScenarioStep::RaiseError { message, stack } => {
                    let mut error = UncaughtError::new(message.clone());
                    error.stack = stack.clone();
                    self.host.raise_uncaught(&error);
                }
                ScenarioStep::Wait { ms } => {
                    tokio::time::sleep(Duration::from_millis(*ms)).await;
                }
                ScenarioStep::WaitLoaded { timeout_ms } => {
                    let wait = self.toolkit.wait_until_loaded();
                    if tokio::time::timeout(Duration::from_millis(*timeout_ms), wait)
                        .await
                        .is_err()
                    {
                        tracing::warn!("Toolkit did not load within {}ms", timeout_ms);
                    }
                }
                ScenarioStep::WaitActivated { timeout_ms } => {
                    let wait = self.toolkit.wait_until_activated();
                    if tokio::time::timeout(Duration::from_millis(*timeout_ms), wait)
                        .await
                        .is_err()
                    {
                        tracing::warn!("Activation pass did not finish within {}ms", timeout_ms);
                    }
                }
            }
        }

        self.report(outcomes, hook_errors)
    }

    fn deliver(&self, message: InboundMessage) -> MessageOutcome {
        self.toolkit
            .on_background_message(Envelope::same_window(message))
    }

    fn report(&self, outcomes: Vec<MessageOutcome>, hook_errors: Vec<String>) -> ScenarioReport {
        let registry = self.toolkit.hook_registry();
        let features = self
            .toolkit
            .instances()
            .into_iter()
            .map(|instance| {
                let summary = FeatureSummary {
                    setting: instance.setting(),
                    enabled: instance.is_enabled(),
                    hooks: registry.feature_hook_count(instance.name()),
                };
                (instance.name().to_string(), summary)
            })
            .collect();

        ScenarioReport {
            outcomes,
            hook_errors,
            loaded: self.toolkit.is_loaded(),
            activated: self.toolkit.activated_count(),
            features,
            hooked_components: self.toolkit.hooked_components(),
            host: self.host.snapshot(),
            errors: self.reporter.reports(),
        }
    }
}
