//! Runtime orchestration and lifecycle management.
//!
//! This module contains the infrastructure for running a router inside an application,
//! including:
//!
//! - **System orchestration**: Mounting resources on the bus and publishing them in the registry
//! - **Lifecycle management**: Completing resources and terminating the bus on shutdown
//! - **Observability setup**: Initializing tracing and logging
//!
//! # Main Components
//!
//! - [`RouterSystem`] - The orchestrator owning the bus, the registry and the mounted resources
//! - [`setup_tracing`] - Initializes the tracing/logging infrastructure

pub mod system;
pub mod tracing;

pub use system::*;
pub use tracing::*;
