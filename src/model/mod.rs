//! Pure data structures routed through the bus and resources.

pub mod detail;
pub mod error;
pub mod event;

pub use detail::*;
pub use error::*;
pub use event::Event;
pub(crate) use event::normalize;
