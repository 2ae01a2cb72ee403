use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::bus::Bus;
use crate::config::RouterConfig;
use crate::error::{Error, Result};
use crate::framework::Subscription;
use crate::model::normalize;
use crate::registry::{
    Attributes, InMemoryRegistry, ProviderSource, Registry, RESOURCE_INTERFACE,
};
use crate::resource::Resource;

/// The runtime orchestrator that ties a bus, a registry and a set of resources together.
///
/// `RouterSystem` is responsible for:
/// - **Wiring**: Every mounted resource listens on the bus topic named after it, so
///   `bus.publish("flights", ev)` reaches `flights.on_next(ev)`.
/// - **Discovery**: Resources are registered by name with `name`/`version` attributes
///   and can be looked up again with [`RouterSystem::resource`].
/// - **Lifecycle**: [`RouterSystem::shutdown`] completes every resource and terminates the bus.
///
/// # Example
///
/// ```ignore
/// let system = RouterSystem::new(RouterConfig::default())?;
/// let flights = Resource::new("flights", "1.0");
/// flights.define_action("find", |ev| Ok(ev.renamed("found")?))?;
/// system.mount(flights)?;
///
/// system.bus().publish("flights", Event::named("find")?);
///
/// system.shutdown();
/// ```
pub struct RouterSystem {
    config: RouterConfig,
    bus: Bus,
    registry: Arc<dyn Registry>,
    mounts: Mutex<Vec<Mount>>,
}

struct Mount {
    resource: Resource,
    feed: Subscription,
}

impl RouterSystem {
    /// Creates the system with an in-memory registry and mounts the configured resources.
    pub fn new(config: RouterConfig) -> Result<Self> {
        Self::with_registry(config, Arc::new(InMemoryRegistry::new()))
    }

    /// Same as [`RouterSystem::new`] but publishes into the given registry.
    pub fn with_registry(config: RouterConfig, registry: Arc<dyn Registry>) -> Result<Self> {
        let system = Self {
            bus: Bus::new(config.bus_name.clone()),
            config,
            registry,
            mounts: Mutex::new(Vec::new()),
        };
        for resource in &system.config.resources {
            system.mount(Resource::new(resource.name.clone(), resource.version.clone()))?;
        }
        info!(
            bus = %system.bus.name(),
            resources = system.config.resources.len(),
            delivery = ?system.config.default_delivery,
            "System started"
        );
        Ok(system)
    }

    /// Parses a TOML configuration and starts the system from it.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Self::new(RouterConfig::from_toml_str(content)?)
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn registry(&self) -> Arc<dyn Registry> {
        self.registry.clone()
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Registers `resource` and subscribes it to the bus topic of the same name.
    ///
    /// # Errors
    /// - [`Error::AlreadyMounted`] if a resource with that name is mounted.
    /// - [`Error::Delivery`] if async forwarding is configured outside a tokio runtime.
    pub fn mount(&self, resource: Resource) -> Result<()> {
        let key = normalize(resource.name());
        let mut mounts = self.mounts.lock();
        if mounts.iter().any(|m| normalize(m.resource.name()) == key) {
            return Err(Error::AlreadyMounted(resource.name().to_string()));
        }

        let target = resource.clone();
        let feed = self.bus.subscribe_fn(
            resource.name(),
            self.config.default_delivery,
            move |event| target.on_next(event.clone()),
        )?;

        let attributes: Attributes = [
            ("name".to_string(), resource.name().to_string()),
            ("version".to_string(), resource.version().to_string()),
        ]
        .into_iter()
        .collect();
        self.registry
            .register(resource.name(), attributes, Arc::new(resource.clone()));

        info!(resource = %resource.name(), version = %resource.version(), "Mounted");
        mounts.push(Mount { resource, feed });
        Ok(())
    }

    /// Instantiates every provider of the resource interface and mounts it.
    ///
    /// Providers that do not build a [`Resource`] are registered as they are.
    /// Returns the number of resources mounted.
    pub fn load_resources(&self, source: &dyn ProviderSource) -> Result<usize> {
        let mut mounted = 0;
        for provider in source.providers(RESOURCE_INTERFACE) {
            match provider.instantiate().downcast::<Resource>() {
                Ok(resource) => {
                    self.mount(Resource::clone(&resource))?;
                    mounted += 1;
                }
                Err(instance) => {
                    warn!(provider = %provider.name(), "Provider did not build a resource");
                    self.registry
                        .register(provider.name(), provider.attributes().clone(), instance);
                }
            }
        }
        Ok(mounted)
    }

    /// Looks a registered resource up by name (case-insensitive).
    ///
    /// # Errors
    /// [`Error::Registry`] if the name is unknown or is not a resource.
    pub fn resource(&self, name: &str) -> Result<Resource> {
        let resource = self.registry.lookup_as::<Resource>(name)?;
        Ok(Resource::clone(&resource))
    }

    /// Names of the mounted resources, in mount order.
    pub fn mounted(&self) -> Vec<String> {
        self.mounts
            .lock()
            .iter()
            .map(|m| m.resource.name().to_string())
            .collect()
    }

    /// Gracefully shuts down the entire system.
    ///
    /// This method:
    /// 1. Detaches every resource from the bus
    /// 2. Completes each resource, which completes all of its actions' observers
    /// 3. Terminates the bus, completing any remaining subscribers
    pub fn shutdown(self) {
        info!("Shutting down system...");

        let mounts = std::mem::take(&mut *self.mounts.lock());
        for mount in mounts {
            mount.feed.unsubscribe();
            mount.resource.on_completed();
        }
        self.bus.unsubscribe_all();

        info!("System shutdown complete.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResourceConfig;
    use crate::framework::mock::RecordingObserver;
    use crate::model::Event;
    use crate::registry::{Provider, StaticProviders};

    #[test]
    fn test_configured_resources_are_mounted() {
        let config = RouterConfig {
            resources: vec![ResourceConfig {
                name: "Flights".to_string(),
                version: "2.0".to_string(),
            }],
            ..RouterConfig::default()
        };
        let system = RouterSystem::new(config).unwrap();

        let flights = system.resource("flights").unwrap();
        assert_eq!(flights.version(), "2.0");
        assert_eq!(system.mounted(), vec!["Flights"]);

        let entry = system.registry().lookup("FLIGHTS").unwrap();
        assert_eq!(entry.attribute("version"), Some("2.0"));
    }

    #[test]
    fn test_duplicate_mount_is_rejected() {
        let system = RouterSystem::new(RouterConfig::default()).unwrap();
        system.mount(Resource::new("hotels", "1.0")).unwrap();

        let err = system.mount(Resource::new("HOTELS", "1.1")).unwrap_err();
        assert!(matches!(err, Error::AlreadyMounted(name) if name == "HOTELS"));
        assert_eq!(system.bus().live_count("hotels"), 1);
    }

    #[test]
    fn test_unknown_resource() {
        let system = RouterSystem::new(RouterConfig::default()).unwrap();
        assert!(matches!(
            system.resource("nope"),
            Err(Error::Registry(crate::registry::RegistryError::UnknownName(_)))
        ));
    }

    #[test]
    fn test_load_resources_from_providers() {
        let source = StaticProviders::new()
            .with(
                RESOURCE_INTERFACE,
                Provider::new("cars", Attributes::new(), || Arc::new(Resource::new("cars", "3.0"))),
            )
            .with(
                RESOURCE_INTERFACE,
                Provider::new("clock", Attributes::new(), || Arc::new(42u64)),
            );
        let system = RouterSystem::new(RouterConfig::default()).unwrap();

        assert_eq!(system.load_resources(&source).unwrap(), 1);
        assert_eq!(system.resource("cars").unwrap().version(), "3.0");
        assert!(system.registry().contains("clock"));
    }

    #[test]
    fn test_shutdown_completes_action_observers() {
        let system = RouterSystem::new(RouterConfig::default()).unwrap();
        let flights = Resource::new("flights", "1.0");
        let find = flights.define_action("find", |e| Ok(e.clone())).unwrap();
        let rec = RecordingObserver::new("find");
        find.subscribe(rec.clone());
        system.mount(flights).unwrap();

        system.bus().publish("flights", Event::named("find").unwrap());
        assert_eq!(rec.count(), 1);

        let bus = system.bus().clone();
        system.shutdown();
        assert_eq!(rec.completed(), 1);
        assert!(bus.is_terminated());
    }
}
