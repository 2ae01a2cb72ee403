//! # Events
//!
//! An immutable, named record routed through buses and resources.
//!
//! # Matching
//! Event names are matched case-insensitively against topics and action names,
//! but [`Event::name`] always returns the name exactly as the producer wrote it.
//!
//! # Immutability
//! The detail map is copied into a shared snapshot when the event is built.
//! Cloning an `Event` is cheap (one `Arc` bump) and every clone sees the same
//! snapshot. Values held by reference inside a [`Detail`] (errors, opaque
//! payloads) are shared, not deep-copied.
//!
//! See [`Detail`] for the value types a detail map can hold.
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::detail::Detail;
use super::error::EventError;
use crate::error::BoxError;

/// Lower-cases a topic or action name for case-insensitive lookups.
pub(crate) fn normalize(name: &str) -> String {
    name.to_lowercase()
}

#[derive(Clone)]
pub struct Event {
    inner: Arc<EventInner>,
}

struct EventInner {
    name: String,
    key: String,
    details: BTreeMap<String, Detail>,
}

impl Event {
    /// Name of the event synthesized when a transform fails.
    pub const ERROR_EVENT: &'static str = "Error";
    /// Detail key carrying the captured failure of an error event.
    pub const ERROR: &'static str = "Error";
    /// Conventional detail key describing the kind of request or response.
    pub const EVENT_TYPE: &'static str = "event-type";
    /// Conventional detail key holding the event a response was derived from.
    pub const SOURCE_EVENT: &'static str = "source-event";

    /// Builds an event from a name and any iterable of detail pairs.
    ///
    /// # Errors
    /// Returns [`EventError::InvalidEvent`] when `name` is empty or blank.
    ///
    /// ```
    /// use event_router::Event;
    ///
    /// let ev = Event::new("Find", [("from", "LHR"), ("to", "JFK")]).unwrap();
    /// assert_eq!(ev.name(), "Find");
    /// assert!(ev.is_named("find"));
    /// assert_eq!(ev.detail("from").and_then(|d| d.as_str()), Some("LHR"));
    /// ```
    pub fn new<K, V, I>(name: impl Into<String>, details: I) -> Result<Self, EventError>
    where
        K: Into<String>,
        V: Into<Detail>,
        I: IntoIterator<Item = (K, V)>,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(EventError::InvalidEvent(
                "event name must not be empty".to_string(),
            ));
        }
        let details = details
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Ok(Self {
            inner: Arc::new(EventInner {
                key: normalize(&name),
                name,
                details,
            }),
        })
    }

    /// Builds an event that carries no details.
    pub fn named(name: impl Into<String>) -> Result<Self, EventError> {
        Self::new(name, std::iter::empty::<(String, Detail)>())
    }

    /// Builds the reserved `"Error"` event wrapping `cause`.
    pub fn error(cause: impl Into<BoxError>) -> Self {
        Self::error_from(cause.into(), None)
    }

    /// Builds an `"Error"` event that also remembers the event which triggered it.
    pub(crate) fn error_from(cause: BoxError, source: Option<Event>) -> Self {
        let mut details = BTreeMap::new();
        details.insert(Self::ERROR.to_string(), Detail::Error(Arc::from(cause)));
        if let Some(source) = source {
            details.insert(Self::SOURCE_EVENT.to_string(), Detail::Event(source));
        }
        Self {
            inner: Arc::new(EventInner {
                name: Self::ERROR_EVENT.to_string(),
                key: normalize(Self::ERROR_EVENT),
                details,
            }),
        }
    }

    /// The name as given by the producer.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The lower-cased name used for routing.
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Case-insensitive name comparison.
    pub fn is_named(&self, name: &str) -> bool {
        self.inner.key == normalize(name)
    }

    /// Read-only view of the detail snapshot.
    pub fn details(&self) -> &BTreeMap<String, Detail> {
        &self.inner.details
    }

    pub fn detail(&self, key: &str) -> Option<&Detail> {
        self.inner.details.get(key)
    }

    /// `true` for the reserved error event produced by failed transforms.
    pub fn is_error(&self) -> bool {
        self.inner.name == Self::ERROR_EVENT
    }

    /// The failure carried by an error event, if any.
    pub fn error_cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.detail(Self::ERROR).and_then(Detail::as_error)
    }

    /// Returns a new event with the same details under a different name.
    pub fn renamed(&self, name: impl Into<String>) -> Result<Self, EventError> {
        Self::new(name, self.inner.details.clone())
    }

    /// Returns a new event with one detail added or replaced.
    ///
    /// The receiver is left untouched; events never change after construction.
    pub fn with_detail(&self, key: impl Into<String>, value: impl Into<Detail>) -> Self {
        let mut details = self.inner.details.clone();
        details.insert(key.into(), value.into());
        Self {
            inner: Arc::new(EventInner {
                name: self.inner.name.clone(),
                key: self.inner.key.clone(),
                details,
            }),
        }
    }

    /// `true` when both handles point at the same snapshot.
    pub fn ptr_eq(&self, other: &Event) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.inner.name)
            .field("details", &self.inner.details)
            .finish()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_name_is_rejected() {
        assert!(matches!(Event::named(""), Err(EventError::InvalidEvent(_))));
        assert!(matches!(Event::named("   "), Err(EventError::InvalidEvent(_))));
    }

    #[test]
    fn test_name_is_case_preserving_and_matches_case_insensitively() {
        let ev = Event::named("FindFlights").unwrap();
        assert_eq!(ev.name(), "FindFlights");
        assert_eq!(ev.key(), "findflights");
        assert!(ev.is_named("FINDFLIGHTS"));
        assert!(!ev.is_named("find"));
    }

    #[test]
    fn test_details_are_a_snapshot() {
        let mut params = BTreeMap::new();
        params.insert("requestor".to_string(), Detail::from("SAM"));
        let ev = Event::new("find", params.clone()).unwrap();

        params.insert("requestor".to_string(), Detail::from("RAM"));
        params.insert("extra".to_string(), Detail::from(1));

        assert_eq!(ev.details().len(), 1);
        assert_eq!(ev.detail("requestor").and_then(Detail::as_str), Some("SAM"));
    }

    #[test]
    fn test_with_detail_leaves_original_untouched() {
        let ev = Event::new("find", [("requestor", json!("SAM"))]).unwrap();
        let changed = ev.with_detail("requestor", "RAM");

        assert_eq!(ev.detail("requestor").and_then(Detail::as_str), Some("SAM"));
        assert_eq!(changed.detail("requestor").and_then(Detail::as_str), Some("RAM"));
        assert!(!ev.ptr_eq(&changed));
    }

    #[test]
    fn test_error_event_carries_cause() {
        let ev = Event::error("boom");
        assert!(ev.is_error());
        assert_eq!(ev.name(), Event::ERROR_EVENT);
        assert_eq!(ev.error_cause().map(|e| e.to_string()), Some("boom".to_string()));
    }
}
