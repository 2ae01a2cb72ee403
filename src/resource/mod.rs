//! # Resources
//!
//! A resource is a named, versioned component exposing a set of [`Action`]s.
//!
//! ## Routing
//!
//! Events pushed with [`Resource::on_next`] enter a single root stream. The defined,
//! active action whose name matches the event name (case-insensitively) transforms it.
//! If no such action exists at the moment of dispatch, the event goes to the resource's
//! default action instead. The choice is made once per event, so an event never reaches
//! both, even while actions are being toggled on other threads. Deactivating or
//! undefining an action hands its events to the default action; reactivating or
//! redefining it takes them back.
//!
//! ## Failures
//!
//! Transforms return `Result<Event, BoxError>`. An `Err` or a panic never escapes
//! [`Resource::on_next`]: it is replaced by an `"Error"` event (see [`Event::error`])
//! delivered to the action's observers in place of the result.
//!
//! ```
//! use event_router::{Event, Resource};
//! use event_router::framework::mock::RecordingObserver;
//!
//! let flights = Resource::new("flights", "1.0");
//! let find = flights
//!     .define_action("find", |ev| Ok(ev.renamed("found")?))
//!     .unwrap();
//! let rec = RecordingObserver::new("find");
//! find.subscribe(rec.clone());
//!
//! flights.on_next(Event::new("Find", [("from", "LHR")]).unwrap());
//! assert_eq!(rec.names(), vec!["found"]);
//! ```

pub mod action;
pub mod error;

pub use action::{Action, DEFAULT_ACTION};
pub use error::*;

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info, instrument, warn};

use crate::error::BoxError;
use crate::framework::core::Sink;
use crate::framework::{Broadcaster, CaughtPanic};
use crate::model::{normalize, Event};

/// Wraps a fallible transform so that it always yields an event.
///
/// An `Err` or a panic becomes an `"Error"` event carrying the cause under
/// [`Event::ERROR`] and the input under [`Event::SOURCE_EVENT`].
pub fn safely<F>(transform: F) -> impl Fn(&Event) -> Event + Send + Sync + 'static
where
    F: Fn(&Event) -> Result<Event, BoxError> + Send + Sync + 'static,
{
    move |event: &Event| {
        let cause = match panic::catch_unwind(AssertUnwindSafe(|| transform(event))) {
            Ok(Ok(out)) => return out,
            Ok(Err(cause)) => cause,
            Err(payload) => Box::new(CaughtPanic::from_payload(payload)) as BoxError,
        };
        warn!(event = %event, error = %cause, "Transform failed");
        Event::error_from(cause, Some(event.clone()))
    }
}

/// A named, versioned set of actions. Clones share the same resource.
#[derive(Clone)]
pub struct Resource {
    inner: Arc<ResourceInner>,
}

struct ResourceInner {
    name: String,
    version: String,
    root: Broadcaster<Event>,
    actions: Arc<DashMap<String, Action>>,
    default: Action,
}

impl Resource {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        let name = name.into();
        let version = version.into();
        let root = Broadcaster::new(name.clone());
        let actions: Arc<DashMap<String, Action>> = Arc::new(DashMap::new());
        let default = Action::default_for(&name);

        root.attach(
            Box::new(|_: &Event| true),
            Box::new(Router {
                actions: actions.clone(),
                default: default.clone(),
            }),
        );

        info!(resource = %name, %version, "Resource created");
        Self {
            inner: Arc::new(ResourceInner {
                name,
                version,
                root,
                actions,
                default,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn version(&self) -> &str {
        &self.inner.version
    }

    /// Defines a new, active action.
    ///
    /// # Errors
    /// - [`ResourceError::ReservedName`] for the default action's name.
    /// - [`ResourceError::DuplicateAction`] if the name is already defined.
    /// - [`ResourceError::InvalidName`] for a blank name.
    #[instrument(skip(self, transform), fields(resource = %self.inner.name))]
    pub fn define_action<F>(&self, name: &str, transform: F) -> Result<Action, ResourceError>
    where
        F: Fn(&Event) -> Result<Event, BoxError> + Send + Sync + 'static,
    {
        if name.trim().is_empty() {
            return Err(ResourceError::InvalidName(name.to_string()));
        }
        let key = normalize(name);
        if key == DEFAULT_ACTION {
            return Err(ResourceError::ReservedName(name.to_string()));
        }

        let action = match self.inner.actions.entry(key.clone()) {
            Entry::Occupied(_) => return Err(ResourceError::DuplicateAction(name.to_string())),
            Entry::Vacant(slot) => {
                let action = Action::named(name, key, &self.inner.name, Box::new(safely(transform)));
                slot.insert(action.clone());
                action
            }
        };
        // Completion walks the map, so only an action inserted after that walk is left.
        if self.inner.root.is_completed() {
            action.close();
        }
        info!(action = %action.name(), "Action defined");
        Ok(action)
    }

    /// Removes an action and completes its observers.
    ///
    /// # Errors
    /// [`ResourceError::UnknownAction`] if it is not defined, [`ResourceError::ReservedName`]
    /// for the default action.
    #[instrument(skip(self), fields(resource = %self.inner.name))]
    pub fn undefine_action(&self, name: &str) -> Result<(), ResourceError> {
        let key = normalize(name);
        if key == DEFAULT_ACTION {
            return Err(ResourceError::ReservedName(name.to_string()));
        }
        let (_, action) = self
            .inner
            .actions
            .remove(&key)
            .ok_or_else(|| ResourceError::UnknownAction(name.to_string()))?;

        let observers = action.observer_count();
        action.terminate();
        info!(action = %action.name(), observers, "Action undefined");
        Ok(())
    }

    /// `true` if `name` is defined. The default action is always defined.
    pub fn is_action_defined(&self, name: &str) -> bool {
        let key = normalize(name);
        key == DEFAULT_ACTION || self.inner.actions.contains_key(&key)
    }

    /// # Errors
    /// [`ResourceError::UnknownAction`] if `name` is not defined.
    pub fn get_action(&self, name: &str) -> Result<Action, ResourceError> {
        let key = normalize(name);
        if key == DEFAULT_ACTION {
            return Ok(self.inner.default.clone());
        }
        self.inner
            .actions
            .get(&key)
            .map(|action| action.value().clone())
            .ok_or_else(|| ResourceError::UnknownAction(name.to_string()))
    }

    pub fn get_default_action(&self) -> Action {
        self.inner.default.clone()
    }

    /// # Errors
    /// [`ResourceError::AlreadyActive`] if it is active, plus the lookup errors of
    /// [`Resource::get_action`].
    pub fn activate_action(&self, name: &str) -> Result<(), ResourceError> {
        let action = self.named_action(name)?;
        if action.swap_active(true) {
            return Err(ResourceError::AlreadyActive(name.to_string()));
        }
        Ok(())
    }

    /// # Errors
    /// [`ResourceError::AlreadyInactive`] if it is inactive, plus the lookup errors of
    /// [`Resource::get_action`].
    pub fn deactivate_action(&self, name: &str) -> Result<(), ResourceError> {
        let action = self.named_action(name)?;
        if !action.swap_active(false) {
            return Err(ResourceError::AlreadyInactive(name.to_string()));
        }
        Ok(())
    }

    /// # Errors
    /// [`ResourceError::UnknownAction`] if `name` is not defined.
    pub fn is_action_active(&self, name: &str) -> Result<bool, ResourceError> {
        self.get_action(name).map(|action| action.is_active())
    }

    fn named_action(&self, name: &str) -> Result<Action, ResourceError> {
        if normalize(name) == DEFAULT_ACTION {
            return Err(ResourceError::ReservedName(name.to_string()));
        }
        self.get_action(name)
    }

    /// Names of the defined actions, sorted. The default action is not listed.
    pub fn action_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .actions
            .iter()
            .map(|entry| entry.value().name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Pushes an event into the resource.
    #[instrument(
        level = "debug",
        skip(self, event),
        fields(resource = %self.inner.name, event = %event)
    )]
    pub fn on_next(&self, event: Event) {
        debug!("on_next");
        self.inner.root.emit(event);
    }

    /// Completes the root stream and, through it, every action.
    pub fn on_completed(&self) {
        info!(resource = %self.inner.name, actions = self.inner.actions.len(), "Completing resource");
        self.inner.root.complete();
    }

    pub fn is_completed(&self) -> bool {
        self.inner.root.is_completed()
    }
}

/// The one reader of a resource's root stream. Each event is matched once, against the
/// action registered under its name, and goes either to that action or to the default.
struct Router {
    actions: Arc<DashMap<String, Action>>,
    default: Action,
}

impl Sink<Event> for Router {
    fn next(&self, event: &Event) {
        let claimed = self
            .actions
            .get(event.key())
            .filter(|action| action.is_active())
            .map(|action| action.value().clone());
        match claimed {
            Some(action) => action.deliver(event),
            None => self.default.deliver(event),
        }
    }

    fn complete(&self) {
        self.default.close();
        let actions: Vec<Action> = self.actions.iter().map(|a| a.value().clone()).collect();
        for action in actions {
            action.close();
        }
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.inner.name)
            .field("version", &self.inner.version)
            .field("actions", &self.action_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safely_passes_results_through() {
        let f = safely(|e: &Event| Ok(e.renamed("out")?));
        let out = f(&Event::named("in").unwrap());
        assert_eq!(out.name(), "out");
        assert!(!out.is_error());
    }

    #[test]
    fn test_safely_turns_err_into_error_event() {
        let f = safely(|_: &Event| Err("no seats".into()));
        let input = Event::named("book").unwrap();
        let out = f(&input);

        assert!(out.is_error());
        assert_eq!(out.error_cause().map(|e| e.to_string()), Some("no seats".to_string()));
        let source = out.detail(Event::SOURCE_EVENT).and_then(|d| d.as_event());
        assert!(source.is_some_and(|s| s.ptr_eq(&input)));
    }

    #[test]
    fn test_safely_turns_panic_into_error_event() {
        let f = safely(|_: &Event| -> Result<Event, BoxError> { panic!("bad fare") });
        let out = f(&Event::named("quote").unwrap());

        assert!(out.is_error());
        assert_eq!(
            out.error_cause().map(|e| e.to_string()),
            Some("Panicked: bad fare".to_string())
        );
    }

    #[test]
    fn test_name_rules() {
        let r = Resource::new("flights", "1.0");
        r.define_action("find", |e| Ok(e.clone())).unwrap();

        assert_eq!(
            r.define_action("FIND", |e| Ok(e.clone())).unwrap_err(),
            ResourceError::DuplicateAction("FIND".to_string())
        );
        assert_eq!(
            r.define_action(DEFAULT_ACTION, |e| Ok(e.clone())).unwrap_err(),
            ResourceError::ReservedName(DEFAULT_ACTION.to_string())
        );
        assert_eq!(
            r.define_action(" ", |e| Ok(e.clone())).unwrap_err(),
            ResourceError::InvalidName(" ".to_string())
        );
        assert_eq!(
            r.undefine_action(DEFAULT_ACTION),
            Err(ResourceError::ReservedName(DEFAULT_ACTION.to_string()))
        );
        assert_eq!(
            r.undefine_action("book"),
            Err(ResourceError::UnknownAction("book".to_string()))
        );
        assert!(r.is_action_defined("Find"));
        assert!(r.is_action_defined(DEFAULT_ACTION));
        assert_eq!(r.action_names(), vec!["find"]);
    }

    #[test]
    fn test_activation_errors() {
        let r = Resource::new("flights", "1.0");
        r.define_action("find", |e| Ok(e.clone())).unwrap();

        assert_eq!(
            r.activate_action("find"),
            Err(ResourceError::AlreadyActive("find".to_string()))
        );
        r.deactivate_action("find").unwrap();
        assert_eq!(r.is_action_active("find"), Ok(false));
        assert_eq!(
            r.deactivate_action("find"),
            Err(ResourceError::AlreadyInactive("find".to_string()))
        );
        r.activate_action("find").unwrap();
        assert_eq!(
            r.activate_action("nope"),
            Err(ResourceError::UnknownAction("nope".to_string()))
        );
        assert_eq!(
            r.deactivate_action(DEFAULT_ACTION),
            Err(ResourceError::ReservedName(DEFAULT_ACTION.to_string()))
        );
    }
}
