//! # Actions
//!
//! A named, independently activatable transformation owned by a [`Resource`](super::Resource).
//!
//! Each action owns a derived stream. While the action is active, events whose name
//! matches the action's name are transformed and the result is broadcast to the
//! action's observers. Deactivating an action hands matching events to the resource's
//! default action until it is reactivated.
//!
//! Observers are deduplicated by `Arc` identity: subscribing the same observer twice
//! returns the first [`Subscription`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info};

use super::error::ResourceError;
use crate::framework::core::Delivery;
use crate::framework::{observer_fn, Broadcaster, DeliveryError, DeliveryMode, Observer, Subscription};
use crate::model::Event;

/// Reserved name of every resource's catch-all action.
pub const DEFAULT_ACTION: &str = "__default__";

/// An already panic-safe transform, see [`safely`](super::safely).
pub(crate) type SafeTransform = Box<dyn Fn(&Event) -> Event + Send + Sync>;

#[derive(Clone)]
pub struct Action {
    inner: Arc<ActionInner>,
}

struct ActionInner {
    name: String,
    key: String,
    resource: String,
    is_default: bool,
    active: AtomicBool,
    stream: Broadcaster<Event>,
    observers: DashMap<usize, Registered>,
    transform: SafeTransform,
}

struct Registered {
    tap: u64,
    subscription: Subscription,
}

/// Address of the observer allocation, used as its identity.
fn identity(observer: &Arc<dyn Observer>) -> usize {
    Arc::as_ptr(observer) as *const () as usize
}

impl Action {
    /// A named, active action applying `transform`.
    pub(crate) fn named(name: &str, key: String, resource: &str, transform: SafeTransform) -> Self {
        Self::build(name, key, resource, false, transform)
    }

    /// The catch-all action, passing events through untouched.
    pub(crate) fn default_for(resource: &str) -> Self {
        Self::build(
            DEFAULT_ACTION,
            DEFAULT_ACTION.to_string(),
            resource,
            true,
            Box::new(|event: &Event| event.clone()),
        )
    }

    fn build(
        name: &str,
        key: String,
        resource: &str,
        is_default: bool,
        transform: SafeTransform,
    ) -> Self {
        Self {
            inner: Arc::new(ActionInner {
                name: name.to_string(),
                stream: Broadcaster::new(format!("{resource}/{key}")),
                key,
                resource: resource.to_string(),
                is_default,
                active: AtomicBool::new(true),
                observers: DashMap::new(),
                transform,
            }),
        }
    }

    /// The name as it was defined.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The lower-cased name events are matched against.
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Name of the owning resource.
    pub fn resource(&self) -> &str {
        &self.inner.resource
    }

    pub fn is_default(&self) -> bool {
        self.inner.is_default
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// `true` once the action was undefined or its resource completed.
    pub fn is_terminated(&self) -> bool {
        self.inner.stream.is_completed()
    }

    /// Number of distinct observers currently attached.
    pub fn observer_count(&self) -> usize {
        self.inner.observers.len()
    }

    /// Switches matching on or off for future events.
    ///
    /// # Errors
    /// [`ResourceError::ReservedName`] for the default action, whose activation is
    /// governed by the other actions.
    pub fn activate(&self, on: bool) -> Result<(), ResourceError> {
        if self.inner.is_default {
            return Err(ResourceError::ReservedName(self.inner.name.clone()));
        }
        self.swap_active(on);
        Ok(())
    }

    /// Sets the flag and returns its previous value.
    pub(crate) fn swap_active(&self, on: bool) -> bool {
        let was = self.inner.active.swap(on, Ordering::SeqCst);
        if was != on {
            info!(
                resource = %self.inner.resource,
                action = %self.inner.name,
                active = on,
                "Action toggled"
            );
        }
        was
    }

    /// Attaches `observer` for inline delivery.
    ///
    /// Subscribing an observer that is already attached returns its existing handle.
    pub fn subscribe(&self, observer: Arc<dyn Observer>) -> Subscription {
        match self.subscribe_with(observer, DeliveryMode::Sync) {
            Ok(subscription) => subscription,
            // Inline delivery never needs a runtime.
            Err(DeliveryError::NoRuntime) => Subscription::closed(),
        }
    }

    /// Closure flavour of [`Action::subscribe`]. Every call attaches a new observer.
    pub fn subscribe_fn<F>(&self, f: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.subscribe(observer_fn(f))
    }

    /// Attaches `observer` with an explicit delivery mode.
    ///
    /// # Errors
    /// [`DeliveryError::NoRuntime`] when `mode` is `Async` outside a tokio runtime.
    pub fn subscribe_with(
        &self,
        observer: Arc<dyn Observer>,
        mode: DeliveryMode,
    ) -> Result<Subscription, DeliveryError> {
        let id = identity(&observer);
        if let Some(existing) = self.inner.observers.get(&id) {
            if !existing.subscription.is_unsubscribed() {
                return Ok(existing.subscription.clone());
            }
        }

        let (tap, subscription) = self.attach(observer, mode, id)?;
        let Some(tap) = tap else {
            return Ok(subscription);
        };

        let existing = match self.inner.observers.entry(id) {
            Entry::Occupied(mut slot) if slot.get().subscription.is_unsubscribed() => {
                slot.insert(Registered {
                    tap,
                    subscription: subscription.clone(),
                });
                None
            }
            Entry::Occupied(slot) => Some(slot.get().subscription.clone()),
            Entry::Vacant(slot) => {
                slot.insert(Registered {
                    tap,
                    subscription: subscription.clone(),
                });
                None
            }
        };

        match existing {
            // Lost a race with another subscribe of the same observer.
            Some(existing) => {
                subscription.unsubscribe();
                Ok(existing)
            }
            None => {
                debug!(
                    resource = %self.inner.resource,
                    action = %self.inner.name,
                    observers = self.inner.observers.len(),
                    ?mode,
                    "Observer attached"
                );
                Ok(subscription)
            }
        }
    }

    fn attach(
        &self,
        observer: Arc<dyn Observer>,
        mode: DeliveryMode,
        id: usize,
    ) -> Result<(Option<u64>, Subscription), DeliveryError> {
        let label = format!("{}/{}", self.inner.resource, self.inner.key);
        let delivery = Delivery::new(mode, observer, &label)?;
        let Some(attached) = self
            .inner
            .stream
            .attach(Box::new(|_: &Event| true), Box::new(delivery))
        else {
            return Ok((None, Subscription::closed()));
        };

        let inner: Weak<ActionInner> = Arc::downgrade(&self.inner);
        let tap = attached.id;
        let subscription = Subscription::new(attached.closed, move || {
            if let Some(inner) = inner.upgrade() {
                inner.stream.detach(tap);
                inner.observers.remove_if(&id, |_, r| r.tap == tap);
            }
        });
        Ok((Some(tap), subscription))
    }

    /// Detaches `observer`. Returns `false` if it was not attached.
    pub fn unsubscribe(&self, observer: &Arc<dyn Observer>) -> bool {
        match self.inner.observers.remove(&identity(observer)) {
            Some((_, registered)) => {
                registered.subscription.unsubscribe();
                true
            }
            None => false,
        }
    }

    /// Transforms `event` and broadcasts the result to the observers.
    /// Dropped once the action is terminated.
    pub(crate) fn deliver(&self, event: &Event) {
        let out = (self.inner.transform)(event);
        debug!(
            resource = %self.inner.resource,
            action = %self.inner.name,
            input = %event,
            output = %out,
            "Dispatch"
        );
        self.inner.stream.emit(out);
    }

    /// Completes the action stream and forgets every observer.
    pub(crate) fn close(&self) {
        self.inner.stream.complete();
        self.inner.observers.clear();
    }

    /// Switches the action off for good, then closes it.
    pub(crate) fn terminate(&self) {
        self.inner.active.store(false, Ordering::SeqCst);
        self.close();
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("resource", &self.inner.resource)
            .field("name", &self.inner.name)
            .field("active", &self.is_active())
            .field("observers", &self.observer_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::mock::RecordingObserver;

    fn wired(name: &str) -> Action {
        Action::named(
            name,
            name.to_lowercase(),
            "test",
            Box::new(|event: &Event| event.clone()),
        )
    }

    #[test]
    fn test_same_observer_subscribes_once() {
        let action = wired("find");
        let rec = RecordingObserver::new("r");

        let first = action.subscribe(rec.clone());
        let second = action.subscribe(rec.clone());

        assert!(first.same_as(&second));
        assert_eq!(action.observer_count(), 1);

        action.deliver(&Event::named("find").unwrap());
        assert_eq!(rec.count(), 1);
    }

    #[test]
    fn test_resubscribe_after_release_is_new_handle() {
        let action = wired("find");
        let rec = RecordingObserver::new("r");

        let first = action.subscribe(rec.clone());
        first.unsubscribe();
        assert_eq!(action.observer_count(), 0);

        let second = action.subscribe(rec.clone());
        assert!(!first.same_as(&second));
        assert!(!second.is_unsubscribed());
    }

    #[test]
    fn test_unsubscribe_by_observer() {
        let action = wired("find");
        let rec: Arc<dyn Observer> = RecordingObserver::new("r");
        let sub = action.subscribe(rec.clone());

        assert!(action.unsubscribe(&rec));
        assert!(!action.unsubscribe(&rec));
        assert!(sub.is_unsubscribed());
    }

    #[test]
    fn test_deliver_applies_transform() {
        let action = Action::named(
            "Find",
            "find".to_string(),
            "test",
            Box::new(|event: &Event| event.renamed("found").unwrap()),
        );
        let rec = RecordingObserver::new("r");
        action.subscribe(rec.clone());

        action.deliver(&Event::named("FIND").unwrap());
        action.terminate();
        action.deliver(&Event::named("FIND").unwrap());

        assert_eq!(rec.names(), vec!["found"]);
        assert!(!action.is_active());
    }

    #[test]
    fn test_default_cannot_be_toggled() {
        let default = Action::default_for("test");
        assert!(default.is_active());
        assert_eq!(
            default.activate(false),
            Err(ResourceError::ReservedName(DEFAULT_ACTION.to_string()))
        );
    }

    #[test]
    fn test_terminate_completes_observers() {
        let action = wired("find");
        let rec = RecordingObserver::new("r");
        action.subscribe(rec.clone());

        action.terminate();
        assert_eq!(rec.completed(), 1);
        assert!(action.is_terminated());
        assert_eq!(action.observer_count(), 0);

        let late = RecordingObserver::new("late");
        let sub = action.subscribe(late.clone());
        assert!(sub.is_unsubscribed());
        assert_eq!(late.completed(), 1);
    }
}
