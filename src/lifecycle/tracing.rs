//! # Observability & Tracing
//!
//! This module provides the tracing infrastructure for the router.
//!
//! ## Overview
//!
//! The [`setup_tracing`] function initializes structured logging with the `tracing` crate.
//! Every log line carries the routing context as fields (`bus`, `topic`, `resource`,
//! `action`, `live`, `observers`) rather than baking it into the message.
//!
//! ## Configuration
//!
//! The output hides the crate/module prefix (`with_target(false)`) and is driven by the
//! `RUST_LOG` environment variable.
//!
//! ## What Gets Traced
//!
//! - **INFO**: Lifecycle transitions. Buses and resources created, actions defined,
//!   undefined or toggled, resources mounted, bus termination, system start and stop.
//! - **DEBUG**: Per-event flow. Publish, subscribe/release with the resulting live
//!   count, and each action dispatch with its input and output event names.
//! - **WARN**: Failures that are turned into data. Transform errors and panics, and
//!   panics inside async handlers.
//! - **TRACE**: Async workers stopping and emissions into completed streams.
//!
//! ## Usage Examples
//!
//! ```bash
//! # Lifecycle only
//! RUST_LOG=info cargo run
//!
//! # Follow every event
//! RUST_LOG=debug cargo run
//!
//! # Only resource routing
//! RUST_LOG=event_router::resource=debug cargo run
//! ```
//!
//! ## Example Output
//!
//! **With `RUST_LOG=debug`**:
//!
//! ```text
//! INFO Action defined resource="flights" action="find"
//! DEBUG Subscribed bus="travel" topic="flights" live=1 mode=Sync
//! DEBUG Publish bus="travel" topic="flights" event=Find
//! DEBUG on_next resource="flights" event=Find
//! DEBUG Dispatch resource="flights" action="find" input=Find output=found
//! ```
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
