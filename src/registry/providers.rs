//! Provider discovery: "which implementations exist for interface X".

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::{Attributes, Instance};

/// Interface name under which resource providers are published.
pub const RESOURCE_INTERFACE: &str = "resource";

type Factory = Arc<dyn Fn() -> Instance + Send + Sync>;

/// One implementation of an interface, with the attributes it was declared with.
#[derive(Clone)]
pub struct Provider {
    name: String,
    attributes: Attributes,
    factory: Factory,
}

impl Provider {
    pub fn new<F>(name: impl Into<String>, attributes: Attributes, factory: F) -> Self
    where
        F: Fn() -> Instance + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            attributes,
            factory: Arc::new(factory),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Builds a fresh instance.
    pub fn instantiate(&self) -> Instance {
        (self.factory)()
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name)
            .field("attributes", &self.attributes)
            .finish()
    }
}

/// Yields the providers declared for an interface.
pub trait ProviderSource: Send + Sync {
    fn providers(&self, interface: &str) -> Vec<Provider>;
}

/// A [`ProviderSource`] assembled by hand at startup.
#[derive(Default, Clone)]
pub struct StaticProviders {
    by_interface: HashMap<String, Vec<Provider>>,
}

impl StaticProviders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `provider` as an implementation of `interface`.
    pub fn with(mut self, interface: &str, provider: Provider) -> Self {
        self.add(interface, provider);
        self
    }

    pub fn add(&mut self, interface: &str, provider: Provider) {
        self.by_interface
            .entry(interface.to_lowercase())
            .or_default()
            .push(provider);
    }
}

impl ProviderSource for StaticProviders {
    fn providers(&self, interface: &str) -> Vec<Provider> {
        self.by_interface
            .get(&interface.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }
}
