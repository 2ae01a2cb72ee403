//! Error types for resources and their actions.

use thiserror::Error;

/// Errors raised synchronously by resource and action management calls.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResourceError {
    /// An action with this name (case-insensitively) already exists.
    #[error("Action already defined: {0}")]
    DuplicateAction(String),

    /// The name is reserved for the default action.
    #[error("Reserved action name: {0}")]
    ReservedName(String),

    /// No action with this name is defined.
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Action already active: {0}")]
    AlreadyActive(String),

    #[error("Action already inactive: {0}")]
    AlreadyInactive(String),

    /// The action name was empty or blank.
    #[error("Invalid action name: {0:?}")]
    InvalidName(String),
}
