//! Error isolation around feature entry points.
//!
//! Every call into feature code goes through a [`Guard`]. Both `Err` results
//! and panics are turned into an [`ErrorReport`] and swallowed; the caller
//! only learns that no value came back.

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::feature::{FeatureName, FeatureSetting};
use crate::report::{ErrorReport, ErrorReporter, FeatureFunction};

/// Reporting boundary for one feature.
pub struct Guard<'a> {
    reporter: &'a dyn ErrorReporter,
    feature: FeatureName,
    setting: Option<FeatureSetting>,
}

impl<'a> Guard<'a> {
    pub fn new(
        reporter: &'a dyn ErrorReporter,
        feature: FeatureName,
        setting: Option<FeatureSetting>,
    ) -> Self {
        Self {
            reporter,
            feature,
            setting,
        }
    }

    /// Run a synchronous entry point.
    pub fn call<T, F>(&self, function: FeatureFunction, f: F) -> Option<T>
    where
        F: FnOnce() -> anyhow::Result<T>,
    {
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                self.report(function, format!("{e:#}"));
                None
            }
            Err(panic) => {
                self.report(function, panic_message(panic.as_ref()));
                None
            }
        }
    }

    /// Run an asynchronous entry point.
    pub async fn call_async<T, Fut>(&self, function: FeatureFunction, fut: Fut) -> Option<T>
    where
        Fut: Future<Output = anyhow::Result<T>>,
    {
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                self.report(function, format!("{e:#}"));
                None
            }
            Err(panic) => {
                self.report(function, panic_message(panic.as_ref()));
                None
            }
        }
    }

    fn report(&self, function: FeatureFunction, exception: String) {
        tracing::warn!("Feature {} failed in {}: {}", self.feature, function, exception);
        self.reporter.report(ErrorReport::new(
            exception,
            self.feature.as_str(),
            self.setting.clone(),
            Some(function),
        ));
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panic: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panic: {message}")
    } else {
        "panic: <non-string payload>".to_string()
    }
}
