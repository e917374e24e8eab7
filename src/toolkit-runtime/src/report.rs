//! Error reporting for feature failures and uncaught errors.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::feature::FeatureSetting;

/// Feature entry point an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureFunction {
    InjectCss,
    ShouldInvoke,
    WillInvoke,
    Invoke,
    Destroy,
    Observe,
    OnRouteChanged,
    OnBudgetChanged,
    /// Uncaught error traced back to the toolkit
    Global,
}

impl FeatureFunction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InjectCss => "inject_css",
            Self::ShouldInvoke => "should_invoke",
            Self::WillInvoke => "will_invoke",
            Self::Invoke => "invoke",
            Self::Destroy => "destroy",
            Self::Observe => "observe",
            Self::OnRouteChanged => "on_route_changed",
            Self::OnBudgetChanged => "on_budget_changed",
            Self::Global => "global",
        }
    }
}

impl fmt::Display for FeatureFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reported failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub exception: String,
    pub feature_name: String,
    pub feature_setting: Option<FeatureSetting>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_name: Option<FeatureFunction>,
    pub occurred_at: DateTime<Utc>,
}

impl ErrorReport {
    pub fn new(
        exception: impl Into<String>,
        feature_name: impl Into<String>,
        feature_setting: Option<FeatureSetting>,
        function_name: Option<FeatureFunction>,
    ) -> Self {
        Self {
            exception: exception.into(),
            feature_name: feature_name.into(),
            feature_setting,
            function_name,
            occurred_at: Utc::now(),
        }
    }
}

/// Error-reporting collaborator.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, report: ErrorReport);
}

/// Reporter that writes every report to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn report(&self, report: ErrorReport) {
        tracing::error!(
            feature = %report.feature_name,
            function = report.function_name.map(FeatureFunction::as_str).unwrap_or("-"),
            setting = ?report.feature_setting,
            "Toolkit error: {}",
            report.exception
        );
    }
}

/// Reporter that keeps reports in memory.
#[derive(Debug, Default)]
pub struct MemoryErrorReporter {
    reports: Mutex<Vec<ErrorReport>>,
}

impl MemoryErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<ErrorReport> {
        self.reports.lock().clone()
    }

    /// Reports attributed to one feature.
    pub fn reports_for(&self, feature: &str) -> Vec<ErrorReport> {
        self.reports
            .lock()
            .iter()
            .filter(|r| r.feature_name == feature)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.reports.lock().clear();
    }
}

impl ErrorReporter for MemoryErrorReporter {
    fn report(&self, report: ErrorReport) {
        self.reports.lock().push(report);
    }
}

/// Uncaught error surfaced by the host's window-level error event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncaughtError {
    pub message: String,
    #[serde(default)]
    pub stack: Option<String>,
}

impl UncaughtError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Message and stack joined the way they are searched and reported.
    pub fn serialized(&self) -> String {
        match &self.stack {
            Some(stack) if !self.message.is_empty() => format!("{}\n{}", self.message, stack),
            Some(stack) => stack.clone(),
            None => self.message.clone(),
        }
    }
}

/// Report an uncaught error only if it references `extension_id`.
///
/// Returns whether a report was filed.
pub fn report_uncaught(
    reporter: &dyn ErrorReporter,
    extension_id: &str,
    error: &UncaughtError,
) -> bool {
    let serialized = error.serialized();
    if extension_id.is_empty() || !serialized.contains(extension_id) {
        return false;
    }

    reporter.report(ErrorReport::new(
        serialized,
        "unknown",
        Some(FeatureSetting::from("unknown")),
        Some(FeatureFunction::Global),
    ));
    true
}
