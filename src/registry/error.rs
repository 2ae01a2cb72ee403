//! Error types for the registry.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RegistryError {
    /// Nothing is registered under this name.
    #[error("Unknown name: {0}")]
    UnknownName(String),

    /// Something is registered, but not of the requested type.
    #[error("{name} is not a {expected}")]
    TypeMismatch { name: String, expected: &'static str },
}
