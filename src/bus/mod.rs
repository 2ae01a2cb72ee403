//! # Topic Bus
//!
//! One shared stream of `(topic, event)` pairs with per-topic subscriptions.
//!
//! ## Liveness
//!
//! The bus keeps a live count per lower-cased topic (see [`Bus::live_count`]). A topic
//! whose count is zero is *dead*, whether it was never subscribed or all of its
//! subscribers released. Dead-topic subscribers
//! ([`Bus::subscribe_for_dead_topics`]) read the count when each event is dispatched,
//! so they follow topics as they go live, dead and live again.
//!
//! ## Delivery
//!
//! Each subscription picks its own [`DeliveryMode`]. `Sync` handlers run inside
//! [`Bus::publish`] and a panic there reaches the publisher. When another thread is
//! already dispatching, `publish` queues the event and that thread delivers it. `Async` handlers run on a
//! tokio worker; their panics are reported to [`Observer::on_error`] and logged.
//!
//! ```
//! use event_router::{Bus, DeliveryMode, Event};
//! use parking_lot::Mutex;
//! use std::sync::Arc;
//!
//! let bus = Bus::new("demo");
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = seen.clone();
//! bus.subscribe_fn("Greetings", DeliveryMode::Sync, move |ev| {
//!     sink.lock().push(ev.name().to_string())
//! })
//! .unwrap();
//!
//! bus.publish("greetings", Event::named("hello").unwrap());
//! assert_eq!(*seen.lock(), vec!["hello"]);
//! ```

mod topics;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::framework::core::{Delivery, Sink};
use crate::framework::{observer_fn, Broadcaster, DeliveryError, DeliveryMode, Observer, Subscription};
use crate::model::{normalize, Event};
use topics::TopicTable;

/// An event travelling through the bus, tagged with its normalized topic.
pub(crate) struct Published {
    topic: String,
    event: Event,
}

struct TopicSink(Delivery);

impl Sink<Published> for TopicSink {
    fn next(&self, item: &Published) {
        self.0.next(&item.event);
    }

    fn complete(&self) {
        self.0.complete();
    }
}

/// A topic-oriented event bus. Clones share the same bus.
#[derive(Clone)]
pub struct Bus {
    inner: Arc<BusInner>,
}

struct BusInner {
    name: String,
    root: Broadcaster<Published>,
    topics: Arc<TopicTable>,
}

impl Bus {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        info!(bus = %name, "Bus created");
        Self {
            inner: Arc::new(BusInner {
                root: Broadcaster::new(name.clone()),
                name,
                topics: Arc::new(TopicTable::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Attaches `observer` to every future event published on `topic` (case-insensitive).
    ///
    /// Subscribing to a terminated bus completes the observer right away and returns
    /// an already released handle.
    ///
    /// # Errors
    /// [`DeliveryError::NoRuntime`] when `mode` is `Async` outside a tokio runtime.
    pub fn subscribe(
        &self,
        topic: &str,
        mode: DeliveryMode,
        observer: Arc<dyn Observer>,
    ) -> Result<Subscription, DeliveryError> {
        let key = normalize(topic);
        let label = format!("{}/{}", self.inner.name, key);
        let delivery = Delivery::new(mode, observer, &label)?;

        let wanted = key.clone();
        let mut live = 0;
        // The topic goes live in the same step the reader is attached.
        let attached = self.inner.root.attach_then(
            Box::new(move |p: &Published| p.topic == wanted),
            Box::new(TopicSink(delivery)),
            || live = self.inner.topics.acquire(&key),
        );
        let Some(attached) = attached else {
            debug!(bus = %self.inner.name, topic = %key, "Subscribe on terminated bus");
            return Ok(Subscription::closed());
        };
        debug!(bus = %self.inner.name, topic = %key, live, ?mode, "Subscribed");

        let inner = Arc::downgrade(&self.inner);
        let id = attached.id;
        Ok(Subscription::new(attached.closed, move || {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let mut live = 0;
            if inner
                .root
                .detach_then(id, || live = inner.topics.release(&key))
            {
                debug!(bus = %inner.name, topic = %key, live, "Released");
            }
        }))
    }

    /// Closure flavour of [`Bus::subscribe`].
    pub fn subscribe_fn<F>(
        &self,
        topic: &str,
        mode: DeliveryMode,
        f: F,
    ) -> Result<Subscription, DeliveryError>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.subscribe(topic, mode, observer_fn(f))
    }

    /// Attaches `observer` to every event whose topic has no live subscriber at the
    /// moment it is dispatched. Does not count towards any topic's liveness.
    ///
    /// # Errors
    /// [`DeliveryError::NoRuntime`] when `mode` is `Async` outside a tokio runtime.
    pub fn subscribe_for_dead_topics(
        &self,
        mode: DeliveryMode,
        observer: Arc<dyn Observer>,
    ) -> Result<Subscription, DeliveryError> {
        let label = format!("{}/<dead>", self.inner.name);
        let delivery = Delivery::new(mode, observer, &label)?;

        let topics = self.inner.topics.clone();
        let attached = self.inner.root.attach(
            Box::new(move |p: &Published| !topics.is_live(&p.topic)),
            Box::new(TopicSink(delivery)),
        );
        let Some(attached) = attached else {
            return Ok(Subscription::closed());
        };
        debug!(bus = %self.inner.name, ?mode, "Subscribed for dead topics");

        let inner = Arc::downgrade(&self.inner);
        let id = attached.id;
        Ok(Subscription::new(attached.closed, move || {
            if let Some(inner) = inner.upgrade() {
                inner.root.detach(id);
            }
        }))
    }

    /// Closure flavour of [`Bus::subscribe_for_dead_topics`].
    pub fn subscribe_for_dead_topics_fn<F>(
        &self,
        mode: DeliveryMode,
        f: F,
    ) -> Result<Subscription, DeliveryError>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.subscribe_for_dead_topics(mode, observer_fn(f))
    }

    /// Delivers `event` to every live subscription on `topic`, or to the dead-topic
    /// subscribers if there is none. Dropped silently when nobody matches.
    #[instrument(
        level = "debug",
        skip(self, event),
        fields(bus = %self.inner.name, event = %event)
    )]
    pub fn publish(&self, topic: &str, event: Event) -> &Self {
        let topic = normalize(topic);
        debug!("Publish");
        self.inner.root.emit(Published { topic, event });
        self
    }

    /// Terminates the bus. Every current subscriber is completed, later subscribers
    /// are completed on arrival and liveness state is cleared.
    pub fn unsubscribe_all(&self) -> &Self {
        info!(
            bus = %self.inner.name,
            subscribers = self.inner.root.tap_count(),
            "Terminating bus"
        );
        self.inner.root.complete();
        self.inner.topics.clear();
        self
    }

    /// Number of unreleased subscriptions on `topic`.
    pub fn live_count(&self, topic: &str) -> usize {
        self.inner.topics.live_count(&normalize(topic))
    }

    pub fn is_live(&self, topic: &str) -> bool {
        self.live_count(topic) > 0
    }

    /// Number of attached subscriptions, dead-topic subscribers included.
    pub fn subscriber_count(&self) -> usize {
        self.inner.root.tap_count()
    }

    pub fn is_terminated(&self) -> bool {
        self.inner.root.is_completed()
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("name", &self.inner.name)
            .field("subscribers", &self.subscriber_count())
            .field("topics", &self.inner.topics.known_topics())
            .field("terminated", &self.is_terminated())
            .finish()
    }
}
