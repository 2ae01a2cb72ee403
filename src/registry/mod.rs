//! # Registry
//!
//! Name-to-instance lookup used to publish and retrieve configured components.
//!
//! Registration never fails for a well-formed name; registering the same name again
//! replaces the earlier entry. Names are matched case-insensitively.
//!
//! Discovery of the components to register lives in [`providers`].

pub mod error;
pub mod providers;

pub use error::*;
pub use providers::{Provider, ProviderSource, StaticProviders, RESOURCE_INTERFACE};

use std::any::{type_name, Any};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::model::normalize;

/// Free-form key/value metadata attached to a registration.
pub type Attributes = BTreeMap<String, String>;

/// A registered component.
pub type Instance = Arc<dyn Any + Send + Sync>;

#[derive(Clone)]
pub struct RegistryEntry {
    name: String,
    attributes: Attributes,
    instance: Instance,
}

impl RegistryEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// The instance as `T`, if that is what was registered.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.instance.clone().downcast::<T>().ok()
    }
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("name", &self.name)
            .field("attributes", &self.attributes)
            .finish()
    }
}

pub trait Registry: Send + Sync {
    fn register(&self, name: &str, attributes: Attributes, instance: Instance);

    /// # Errors
    /// [`RegistryError::UnknownName`] if nothing is registered under `name`.
    fn lookup(&self, name: &str) -> Result<RegistryEntry, RegistryError>;

    /// Every entry accepted by `filter`, sorted by name.
    fn lookup_all(&self, filter: &dyn Fn(&RegistryEntry) -> bool) -> Vec<RegistryEntry>;

    fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_ok()
    }
}

impl dyn Registry {
    /// Looks `name` up and downcasts it.
    ///
    /// # Errors
    /// [`RegistryError::UnknownName`] or [`RegistryError::TypeMismatch`].
    pub fn lookup_as<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, RegistryError> {
        self.lookup(name)?
            .downcast::<T>()
            .ok_or_else(|| RegistryError::TypeMismatch {
                name: name.to_string(),
                expected: type_name::<T>(),
            })
    }
}

#[derive(Default)]
pub struct InMemoryRegistry {
    entries: DashMap<String, RegistryEntry>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Registry for InMemoryRegistry {
    fn register(&self, name: &str, attributes: Attributes, instance: Instance) {
        let entry = RegistryEntry {
            name: name.to_string(),
            attributes,
            instance,
        };
        let replaced = self.entries.insert(normalize(name), entry).is_some();
        debug!(name, replaced, "Registered");
    }

    fn lookup(&self, name: &str) -> Result<RegistryEntry, RegistryError> {
        self.entries
            .get(&normalize(name))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RegistryError::UnknownName(name.to_string()))
    }

    fn lookup_all(&self, filter: &dyn Fn(&RegistryEntry) -> bool) -> Vec<RegistryEntry> {
        let mut found: Vec<RegistryEntry> = self
            .entries
            .iter()
            .filter(|entry| filter(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found
    }
}

impl fmt::Debug for InMemoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryRegistry")
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = InMemoryRegistry::new();
        registry.register("Flights", attrs(&[("version", "1.0")]), Arc::new(7u32));

        let entry = registry.lookup("flights").unwrap();
        assert_eq!(entry.name(), "Flights");
        assert_eq!(entry.attribute("version"), Some("1.0"));
        assert_eq!(entry.downcast::<u32>().as_deref(), Some(&7));
        assert!(registry.contains("FLIGHTS"));
    }

    #[test]
    fn test_unknown_name() {
        let registry = InMemoryRegistry::new();
        assert_eq!(
            registry.lookup("ghost").unwrap_err(),
            RegistryError::UnknownName("ghost".to_string())
        );
    }

    #[test]
    fn test_latest_registration_wins() {
        let registry = InMemoryRegistry::new();
        registry.register("a", Attributes::new(), Arc::new(1u32));
        registry.register("a", Attributes::new(), Arc::new(2u32));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("a").unwrap().downcast::<u32>().as_deref(), Some(&2));
    }

    #[test]
    fn test_lookup_all_filters_by_attribute() {
        let registry = InMemoryRegistry::new();
        registry.register("b", attrs(&[("kind", "resource")]), Arc::new(()));
        registry.register("a", attrs(&[("kind", "resource")]), Arc::new(()));
        registry.register("c", attrs(&[("kind", "codec")]), Arc::new(()));

        let names: Vec<String> = registry
            .lookup_all(&|e: &RegistryEntry| e.attribute("kind") == Some("resource"))
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_lookup_as_checks_type() {
        let registry: Arc<dyn Registry> = Arc::new(InMemoryRegistry::new());
        registry.register("n", Attributes::new(), Arc::new(String::from("x")));

        assert_eq!(registry.lookup_as::<String>("n").unwrap().as_str(), "x");
        assert!(matches!(
            registry.lookup_as::<u32>("n"),
            Err(RegistryError::TypeMismatch { .. })
        ));
    }
}
