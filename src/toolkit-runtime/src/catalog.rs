//! Declared features.
//!
//! The catalog is the ordered list of feature constructors known to the
//! runtime. Bootstrap builds exactly one instance per entry, in declaration
//! order.

use indexmap::IndexMap;
use std::sync::Arc;

use crate::feature::{Feature, FeatureName};
use crate::{Result, ToolkitError};

/// Constructor for a feature implementation.
pub type FeatureFactory = Arc<dyn Fn() -> Arc<dyn Feature> + Send + Sync>;

/// Ordered set of feature constructors, unique by name.
#[derive(Default, Clone)]
pub struct FeatureCatalog {
    factories: IndexMap<FeatureName, FeatureFactory>,
}

impl FeatureCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a feature. The factory is called once to learn its name.
    pub fn declare<F>(&mut self, factory: F) -> Result<()>
    where
        F: Fn() -> Arc<dyn Feature> + Send + Sync + 'static,
    {
        let name = factory().name();
        if self.factories.contains_key(&name) {
            return Err(ToolkitError::DuplicateFeature(name.to_string()));
        }
        self.factories.insert(name, Arc::new(factory));
        Ok(())
    }

    /// Builder-style [`FeatureCatalog::declare`].
    pub fn with<F>(mut self, factory: F) -> Result<Self>
    where
        F: Fn() -> Arc<dyn Feature> + Send + Sync + 'static,
    {
        self.declare(factory)?;
        Ok(self)
    }

    pub fn names(&self) -> Vec<FeatureName> {
        self.factories.keys().copied().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Construct one instance of every declared feature, in declaration order.
    pub fn build(&self) -> Vec<Arc<dyn Feature>> {
        self.factories.values().map(|factory| factory()).collect()
    }
}
