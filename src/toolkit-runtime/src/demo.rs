//! Demo features used by the `toolkit-host` driver.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use toolkit_runtime::{
    Feature, FeatureCatalog, FeatureContext, FeatureName, LifecycleEvent, Result, Route,
};

/// Colours negative available balances in the budget table.
pub struct HighlightNegatives;

impl Feature for HighlightNegatives {
    fn name(&self) -> FeatureName {
        FeatureName::new("HighlightNegatives")
    }

    fn inject_css(&self, _ctx: &FeatureContext) -> anyhow::Result<String> {
        Ok(".budget-table-row .negative { color: #d33c2d; }".to_string())
    }

    fn should_invoke(&self, _ctx: &FeatureContext) -> anyhow::Result<bool> {
        Ok(true)
    }

    fn invoke(&self, ctx: &FeatureContext) -> anyhow::Result<()> {
        ctx.add_hook("budget-table-row", LifecycleEvent::Rendered, |element| {
            info!("Highlighting negatives in {}", element.id);
            Ok(())
        });
        Ok(())
    }
}

/// Check-number column in the register, with a layout variant.
pub struct CheckNumbers;

#[async_trait]
impl Feature for CheckNumbers {
    fn name(&self) -> FeatureName {
        FeatureName::new("CheckNumbers")
    }

    async fn will_invoke(&self, ctx: &FeatureContext) -> anyhow::Result<()> {
        let stored = ctx.storage().get_feature_setting("CheckNumbers").await?;
        info!("CheckNumbers stored setting: {:?}", stored);
        Ok(())
    }

    fn inject_css(&self, ctx: &FeatureContext) -> anyhow::Result<String> {
        let width = match ctx.setting().and_then(|s| s.variant()) {
            Some("wide") => "8rem",
            _ => "5rem",
        };
        Ok(format!(".register-row .tk-check-number {{ width: {width}; }}"))
    }

    fn should_invoke(&self, _ctx: &FeatureContext) -> anyhow::Result<bool> {
        Ok(true)
    }

    fn invoke(&self, ctx: &FeatureContext) -> anyhow::Result<()> {
        ctx.add_hook("register-row", LifecycleEvent::Inserted, |element| {
            info!("Adding check number cell to {}", element.id);
            Ok(())
        });
        ctx.add_hook("register-row", LifecycleEvent::Updated, |element| {
            info!("Refreshing check number cell in {}", element.id);
            Ok(())
        });
        Ok(())
    }

    fn destroy(&self, _ctx: &FeatureContext) -> anyhow::Result<()> {
        info!("Removing check number cells");
        Ok(())
    }
}

/// Logs navigation between budgets.
pub struct BudgetTracker;

impl Feature for BudgetTracker {
    fn name(&self) -> FeatureName {
        FeatureName::new("BudgetTracker")
    }

    fn should_invoke(&self, ctx: &FeatureContext) -> anyhow::Result<bool> {
        Ok(ctx.state().is_bootstrapped())
    }

    fn invoke(&self, _ctx: &FeatureContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_route_changed(&self, _ctx: &FeatureContext, route: &Route) -> anyhow::Result<()> {
        info!("Route changed to {}", route.path);
        Ok(())
    }

    fn on_budget_changed(&self, _ctx: &FeatureContext, budget_id: &str) -> anyhow::Result<()> {
        info!("Budget changed to {}", budget_id);
        Ok(())
    }

    fn observe(&self, _ctx: &FeatureContext, changed: &[String]) -> anyhow::Result<()> {
        info!("Observed {} changed nodes", changed.len());
        Ok(())
    }
}

/// Never gets past `invoke`; its failure is reported and nothing else breaks.
pub struct BrokenFeature;

impl Feature for BrokenFeature {
    fn name(&self) -> FeatureName {
        FeatureName::new("BrokenFeature")
    }

    fn should_invoke(&self, _ctx: &FeatureContext) -> anyhow::Result<bool> {
        Ok(true)
    }

    fn invoke(&self, _ctx: &FeatureContext) -> anyhow::Result<()> {
        anyhow::bail!("column layout not found")
    }
}

/// Every demo feature, in declaration order.
pub fn catalog() -> Result<FeatureCatalog> {
    FeatureCatalog::new()
        .with(|| Arc::new(HighlightNegatives))?
        .with(|| Arc::new(CheckNumbers))?
        .with(|| Arc::new(BudgetTracker))?
        .with(|| Arc::new(BrokenFeature))
}
