use std::time::Duration;

use event_router::framework::mock::RecordingObserver;
use event_router::lifecycle::RouterSystem;
use event_router::registry::{Attributes, Provider, StaticProviders, RESOURCE_INTERFACE};
use event_router::{DeliveryMode, Error, Event, Resource};

const CONFIG: &str = r#"
bus_name = "travel"

[[resources]]
name = "flights"
version = "2.0"

[[resources]]
name = "hotels"
"#;

/// Full end-to-end flow: config, mounting, bus routing, actions, dead letters, shutdown.
#[test]
fn test_full_router_system_integration() {
    let system = RouterSystem::from_toml_str(CONFIG).expect("Failed to start system");
    assert_eq!(system.bus().name(), "travel");
    assert_eq!(system.mounted(), vec!["flights", "hotels"]);

    let flights = system.resource("flights").expect("flights not registered");
    assert_eq!(flights.version(), "2.0");
    let hotels = system.resource("HOTELS").expect("hotels not registered");
    assert_eq!(hotels.version(), "1.0");

    let find = flights
        .define_action("find", |e| Ok(e.renamed("found")?))
        .expect("Failed to define action");
    let found = RecordingObserver::new("found");
    find.subscribe(found.clone());

    let unhandled = RecordingObserver::new("hotels-default");
    hotels.get_default_action().subscribe(unhandled.clone());

    let dead = RecordingObserver::new("dead");
    system
        .bus()
        .subscribe_for_dead_topics(DeliveryMode::Sync, dead.clone())
        .unwrap();

    system
        .bus()
        .publish("Flights", Event::named("find").unwrap())
        .publish("hotels", Event::named("reserve").unwrap())
        .publish("cars", Event::named("rent").unwrap());

    assert_eq!(found.names(), vec!["found"]);
    assert_eq!(unhandled.names(), vec!["reserve"]);
    assert_eq!(dead.names(), vec!["rent"]);

    let bus = system.bus().clone();
    system.shutdown();

    assert_eq!(found.completed(), 1);
    assert_eq!(unhandled.completed(), 1);
    assert_eq!(dead.completed(), 1);
    assert!(flights.is_completed());
    assert!(bus.is_terminated());
}

#[test]
fn test_async_forwarding_needs_a_runtime() {
    let config = r#"
        default_delivery = "async"

        [[resources]]
        name = "flights"
    "#;
    let err = RouterSystem::from_toml_str(config).err().expect("should fail");
    assert!(matches!(err, Error::Delivery(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_forwarding_into_resource() {
    let config = r#"
        default_delivery = "async"

        [[resources]]
        name = "flights"
    "#;
    let system = RouterSystem::from_toml_str(config).unwrap();
    let flights = system.resource("flights").unwrap();
    let find = flights.define_action("find", |e| Ok(e.clone())).unwrap();
    let rec = RecordingObserver::new("find");
    find.subscribe(rec.clone());

    system.bus().publish("flights", Event::named("find").unwrap());

    assert!(rec.wait_for(1, Duration::from_secs(2)).await);
    assert!(rec.delivered_on_other_thread());
    system.shutdown();
}

#[test]
fn test_bad_config_is_reported() {
    let err = RouterSystem::from_toml_str("bus_name = 3").err().expect("should fail");
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_resources_from_providers_are_mounted() {
    let mut attributes = Attributes::new();
    attributes.insert("owner".to_string(), "travel-team".to_string());
    let source = StaticProviders::new().with(
        RESOURCE_INTERFACE,
        Provider::new("trains", attributes, || {
            let trains = Resource::new("trains", "0.9");
            trains
                .define_action("timetable", |e| Ok(e.renamed("timetable-response")?))
                .unwrap();
            std::sync::Arc::new(trains)
        }),
    );

    let system = RouterSystem::new(Default::default()).unwrap();
    assert_eq!(system.load_resources(&source).unwrap(), 1);

    let trains = system.resource("trains").unwrap();
    let rec = RecordingObserver::new("timetable");
    trains.get_action("timetable").unwrap().subscribe(rec.clone());

    system.bus().publish("trains", Event::named("Timetable").unwrap());
    assert_eq!(rec.names(), vec!["timetable-response"]);

    let entry = system.registry().lookup("trains").unwrap();
    assert_eq!(entry.attribute("version"), Some("0.9"));
}
