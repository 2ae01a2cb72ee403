//! Error types for event construction.

use thiserror::Error;

/// Errors raised while building an [`Event`](super::Event).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EventError {
    /// The event name was empty or otherwise unusable.
    #[error("Invalid event: {0}")]
    InvalidEvent(String),
}
