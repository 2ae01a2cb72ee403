//! Generic stream framework shared by the bus and resources.
//!
//! This module provides the building blocks both routing layers are made of: who receives
//! events, how they are delivered, and how a registration is released.
//!
//! # Main Components
//!
//! - [`Observer`] - Trait implemented by anything that receives events
//! - [`DeliveryMode`] - Inline or queued-to-a-worker delivery
//! - [`Broadcaster`] - Serialized multi-writer broadcast point with filtered readers
//! - [`Subscription`] - Releasable handle to one registration
//! - [`DeliveryError`] / [`CaughtPanic`] - Errors raised by the plumbing itself
//!
//! # Testing
//!
//! See [`mock`] module for a recording observer that makes delivery easy to assert.

pub mod core;
pub mod mock;
pub mod subscription;

pub use self::core::{
    observer_fn, Broadcaster, CaughtPanic, DeliveryError, DeliveryMode, FnObserver, Observer,
};
pub use subscription::Subscription;
