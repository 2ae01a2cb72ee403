//! # Event Router Demo
//!
//! Starts a [`RouterSystem`] from an inline TOML config, defines a couple of actions on a
//! flight resource and pushes requests through the bus.

use std::time::Duration;

use event_router::framework::mock::RecordingObserver;
use event_router::lifecycle::{setup_tracing, RouterSystem};
use event_router::{DeliveryMode, Detail, Event};
use tracing::{error, info, warn};

const CONFIG: &str = r#"
bus_name = "travel"
default_delivery = "sync"

[[resources]]
name = "flights"
version = "1.0"
"#;

#[tokio::main]
async fn main() -> Result<(), event_router::Error> {
    // Setup tracing once for the entire application
    setup_tracing();

    info!("Starting travel router");
    let system = RouterSystem::from_toml_str(CONFIG)?;
    let flights = system.resource("flights")?;

    let find = flights.define_action("find", |request| {
        let from = request
            .detail("from")
            .and_then(|d| d.as_str())
            .ok_or("missing 'from'")?;
        Ok(Event::new(
            "found",
            [
                (Event::EVENT_TYPE, Detail::from("response")),
                ("flights", Detail::from(format!("{from}-001,{from}-002"))),
                (Event::SOURCE_EVENT, Detail::from(request.clone())),
            ],
        )?)
    })?;
    let found = RecordingObserver::new("find");
    find.subscribe(found.clone());

    let unhandled = RecordingObserver::new("default");
    flights.get_default_action().subscribe(unhandled.clone());

    let dead = RecordingObserver::new("dead-letters");
    system
        .bus()
        .subscribe_for_dead_topics(DeliveryMode::Async, dead.clone())?;

    let bus = system.bus();
    bus.publish("flights", Event::new("Find", [("from", "LHR")])?)
        .publish("flights", Event::named("find")?)
        .publish("flights", Event::named("book")?)
        .publish("hotels", Event::named("find")?);

    for ev in found.events() {
        if ev.is_error() {
            warn!(cause = ?ev.error_cause().map(|e| e.to_string()), "find failed");
        } else {
            info!(flights = ?ev.detail("flights"), "find answered");
        }
    }
    info!(events = ?unhandled.names(), "Handled by default action");

    if dead.wait_for(1, Duration::from_secs(1)).await {
        info!(events = ?dead.names(), "Dead letters");
    } else {
        error!("Dead-letter delivery timed out");
    }

    system.shutdown();
    info!("Application completed successfully");
    Ok(())
}
