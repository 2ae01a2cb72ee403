//! Crate-level error type.
//!
//! Each module owns its error enum; [`Error`] wraps them so the orchestration layer can
//! use `?` across module boundaries.

use thiserror::Error;

use crate::config::ConfigError;
use crate::framework::DeliveryError;
use crate::model::EventError;
use crate::registry::RegistryError;
use crate::resource::ResourceError;

/// Failure type returned by transforms.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Event(#[from] EventError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A resource with this name is already mounted.
    #[error("Resource already mounted: {0}")]
    AlreadyMounted(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
