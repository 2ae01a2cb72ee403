#![doc(html_logo_url = "https://www.rust-lang.org/logos/rust-logo-128x128.png")]
#![doc(html_favicon_url = "https://www.rust-lang.org/favicon.ico")]
//! # Event Router
//!
//! > **In-process, topic-oriented event routing with activatable actions.**
//!
//! This crate wires producers of named [`Event`]s to consumers without a network
//! boundary. It has two routing layers:
//!
//! - A [`Bus`] that routes by topic, tracks which topics have live subscribers and
//!   sends events on dead topics to a catch-all.
//! - [`Resource`]s that route by event name into named, independently activatable
//!   [`Action`]s, each transforming events for its own observers, with a default
//!   action catching everything no active action claims.
//!
//! ## 🏗️ Design Philosophy
//!
//! ### Liveness is read at delivery time
//! Both catch-alls (dead topics on the bus, the default action on a resource) evaluate
//! their condition per event, when it is dispatched. Subscribing, releasing, activating
//! or undefining in between publishes changes where the *next* event goes, never where
//! an earlier one went.
//!
//! ### Failures are data
//! A failing transform does not break its stream. Its error turns into an `"Error"` event
//! that observers receive like any other (see [`safely`]).
//!
//! ## 👩‍💻 Architecture Notes
//!
//! ### 1. Serialized broadcast points
//! Every bus and every action stream is a [`Broadcaster`](framework::Broadcaster). Any
//! thread may publish; dispatch is serialized so each observer sees events one at a time,
//! in the order the broadcaster accepted them.
//!
//! ### 2. Delivery modes
//! [`DeliveryMode::Sync`] runs the handler inside `publish`. [`DeliveryMode::Async`] hands
//! the event to a per-subscription tokio worker and returns immediately.
//!
//! ### 3. Type-Safe Error Handling
//! Each module defines its own error type (`EventError`, `ResourceError`,
//! `RegistryError`, ...). The crate-level [`Error`] wraps them with `#[from]`.
//!
//! ### 4. Observability
//! We use `tracing` everywhere with structured fields. See the [`lifecycle::tracing`]
//! module for details.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Data ([`model`])
//! - **Key items**: [`Event`], [`Detail`].
//!
//! ### 2. The Engine ([`framework`])
//! - **Role**: Observers, delivery modes, subscriptions and the broadcast primitive.
//! - **Key items**: [`Observer`], [`Subscription`], [`framework::mock::RecordingObserver`].
//!
//! ### 3. The Routers ([`bus`], [`resource`])
//! - **Key items**: [`Bus`], [`Resource`], [`Action`].
//!
//! ### 4. The Orchestrator ([`lifecycle`], [`registry`], [`config`])
//! - **Role**: Mounts resources on a bus, publishes them in a registry, shuts everything down.
//! - **Key items**: [`RouterSystem`](lifecycle::RouterSystem), [`RouterConfig`](config::RouterConfig).
//!
//! ## 🚀 Quick Start
//!
//! ```bash
//! # Run the demo with info logs
//! RUST_LOG=info cargo run
//!
//! cargo test
//! ```

pub mod bus;
pub mod config;
pub mod error;
pub mod framework;
pub mod lifecycle;
pub mod model;
pub mod registry;
pub mod resource;

pub use bus::Bus;
pub use error::{BoxError, Error, Result};
pub use framework::{DeliveryMode, Observer, Subscription};
pub use model::{Detail, Event};
pub use resource::{safely, Action, Resource, DEFAULT_ACTION};
