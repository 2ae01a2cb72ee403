//! # Core Stream Framework
//!
//! This module defines the generic building blocks every bus and resource is made of.
//!
//! ## Key Types
//!
//! - [`Observer`]: The capability interface that receives events.
//! - [`DeliveryMode`]: Inline (`Sync`) or queued-to-a-worker (`Async`) delivery.
//! - [`Broadcaster`]: A serialized, multi-writer, multi-reader broadcast point.
//! - [`DeliveryError`] and [`CaughtPanic`]: Errors raised by the plumbing itself.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::model::Event;

// =============================================================================
// 1. THE ABSTRACTION (Observers and delivery modes)
// =============================================================================

/// Anything that wants to receive events.
///
/// # Provided Methods (Hooks)
/// Only [`Observer::on_event`] is required. [`Observer::on_complete`] fires once when the
/// stream the observer is attached to terminates, and [`Observer::on_error`] reports a
/// failure raised by this observer's own asynchronous delivery path.
///
/// Observers are shared as `Arc<dyn Observer>`. The `Arc` allocation is the observer's
/// identity: attaching the same `Arc` twice to an [`Action`](crate::resource::Action)
/// returns the first subscription instead of delivering twice.
pub trait Observer: Send + Sync + 'static {
    /// Called once per delivered event.
    fn on_event(&self, event: &Event);

    /// Called when the stream completes. No events follow.
    fn on_complete(&self) {}

    /// Called when an asynchronous delivery to this observer panicked.
    fn on_error(&self, _cause: &(dyn std::error::Error + Send + Sync + 'static)) {}
}

/// Adapts a closure into an [`Observer`].
pub struct FnObserver<F> {
    f: F,
}

impl<F> FnObserver<F>
where
    F: Fn(&Event) + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Observer for FnObserver<F>
where
    F: Fn(&Event) + Send + Sync + 'static,
{
    fn on_event(&self, event: &Event) {
        (self.f)(event)
    }
}

/// Shorthand for `Arc::new(FnObserver::new(f))`.
pub fn observer_fn<F>(f: F) -> Arc<dyn Observer>
where
    F: Fn(&Event) + Send + Sync + 'static,
{
    Arc::new(FnObserver::new(f))
}

/// How a subscription's handler is invoked.
///
/// - **Sync**: inline, on the thread dispatching the stream. That is the publisher unless
///   another thread is already dispatching, in which case that thread delivers it.
/// - **Async**: on a tokio worker fed by an unbounded per-subscription queue; the
///   publisher never waits for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    #[default]
    Sync,
    Async,
}

// =============================================================================
// 2. THE ERRORS
// =============================================================================

/// Errors raised while wiring up a delivery path.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum DeliveryError {
    #[error("Asynchronous delivery requires a running tokio runtime")]
    NoRuntime,
}

/// A panic captured from user code and turned into an ordinary error value.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
#[error("Panicked: {0}")]
pub struct CaughtPanic(pub String);

impl CaughtPanic {
    pub(crate) fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let msg = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic".to_string()
        };
        Self(msg)
    }
}

// =============================================================================
// 3. THE DELIVERY PATH
// =============================================================================

/// A unit travelling through a stream or an async queue.
pub(crate) enum Signal<T> {
    Next(T),
    Complete,
}

/// Receiving end of a broadcaster tap.
pub(crate) trait Sink<T>: Send + Sync {
    fn next(&self, item: &T);
    fn complete(&self);
}

/// An observer bound to its delivery mode.
pub(crate) enum Delivery {
    Inline(Arc<dyn Observer>),
    Queued(mpsc::UnboundedSender<Signal<Event>>),
}

impl Delivery {
    /// Binds `observer` to `mode`, spawning the worker for async delivery.
    ///
    /// # Errors
    /// [`DeliveryError::NoRuntime`] when `Async` is requested outside a tokio runtime.
    pub(crate) fn new(
        mode: DeliveryMode,
        observer: Arc<dyn Observer>,
        label: &str,
    ) -> Result<Self, DeliveryError> {
        match mode {
            DeliveryMode::Sync => Ok(Delivery::Inline(observer)),
            DeliveryMode::Async => {
                let runtime = tokio::runtime::Handle::try_current()
                    .map_err(|_| DeliveryError::NoRuntime)?;
                let (sender, receiver) = mpsc::unbounded_channel();
                runtime.spawn(drain(receiver, observer, label.to_string()));
                Ok(Delivery::Queued(sender))
            }
        }
    }
}

impl Sink<Event> for Delivery {
    fn next(&self, event: &Event) {
        match self {
            Delivery::Inline(observer) => observer.on_event(event),
            Delivery::Queued(sender) => {
                // A closed queue means the worker is gone; the event has nowhere to go.
                let _ = sender.send(Signal::Next(event.clone()));
            }
        }
    }

    fn complete(&self) {
        match self {
            Delivery::Inline(observer) => observer.on_complete(),
            Delivery::Queued(sender) => {
                let _ = sender.send(Signal::Complete);
            }
        }
    }
}

/// Worker loop behind one async subscription.
///
/// Runs until the queue closes (subscription released) or a completion arrives.
/// A panicking handler is reported to the observer's `on_error` and the loop
/// keeps going.
async fn drain(
    mut receiver: mpsc::UnboundedReceiver<Signal<Event>>,
    observer: Arc<dyn Observer>,
    label: String,
) {
    while let Some(signal) = receiver.recv().await {
        match signal {
            Signal::Next(event) => {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| observer.on_event(&event)));
                if let Err(payload) = outcome {
                    let cause = CaughtPanic::from_payload(payload);
                    warn!(stream = %label, event = %event, error = %cause, "Async handler panicked");
                    let _ = panic::catch_unwind(AssertUnwindSafe(|| observer.on_error(&cause)));
                }
            }
            Signal::Complete => {
                let _ = panic::catch_unwind(AssertUnwindSafe(|| observer.on_complete()));
                break;
            }
        }
    }
    trace!(stream = %label, "Async worker stopped");
}

// =============================================================================
// 4. THE BROADCASTER
// =============================================================================

pub(crate) type Filter<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

struct Tap<T> {
    id: u64,
    filter: Filter<T>,
    sink: Box<dyn Sink<T>>,
    closed: Arc<AtomicBool>,
}

/// What [`Broadcaster::attach`] hands back: the tap id and its shared "closed" flag.
pub(crate) struct Attached {
    pub id: u64,
    pub closed: Arc<AtomicBool>,
}

/// A single broadcast point.
///
/// # Architecture Note
/// Writers call [`Broadcaster::emit`] from any thread. Emissions are serialized: only one
/// thread dispatches at a time, so every reader sees items one by one, in the order the
/// broadcaster accepted them. A writer that finds the broadcaster busy, whether another
/// thread or a reader running inline, queues its item and returns at once. The thread
/// that is dispatching delivers it before it lets go. No writer ever waits for another
/// writer's readers.
///
/// Readers ("taps") pair a filter with a sink. Filters run at dispatch time, so any state
/// they read (topic liveness, for one) is evaluated per item. All filters for an item are
/// evaluated before the first sink runs, under the lock [`Broadcaster::attach_then`] and
/// [`Broadcaster::detach_then`] hold while running their hooks. State those hooks change
/// is therefore never seen half-updated by the routing of a single item. Filters must not
/// call back into the broadcaster.
pub struct Broadcaster<T> {
    label: String,
    taps: RwLock<Vec<Arc<Tap<T>>>>,
    gate: Gate<T>,
    completed: AtomicBool,
    next_id: AtomicU64,
}

impl<T: Send + Sync + 'static> Broadcaster<T> {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            taps: RwLock::new(Vec::new()),
            gate: Gate::new(),
            completed: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// Number of readers currently attached.
    pub fn tap_count(&self) -> usize {
        self.taps.read().len()
    }

    /// Attaches a reader. On an already completed broadcaster the sink is completed
    /// immediately and `None` is returned.
    pub(crate) fn attach(&self, filter: Filter<T>, sink: Box<dyn Sink<T>>) -> Option<Attached> {
        self.attach_then(filter, sink, || {})
    }

    /// Like [`Broadcaster::attach`], running `on_attached` while no item can be in routing.
    pub(crate) fn attach_then(
        &self,
        filter: Filter<T>,
        sink: Box<dyn Sink<T>>,
        on_attached: impl FnOnce(),
    ) -> Option<Attached> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let closed = Arc::new(AtomicBool::new(false));
        let tap = Arc::new(Tap {
            id,
            filter,
            sink,
            closed: closed.clone(),
        });
        {
            let mut taps = self.taps.write();
            if !self.is_completed() {
                taps.push(tap);
                on_attached();
                return Some(Attached { id, closed });
            }
        }
        closed.store(true, Ordering::SeqCst);
        tap.sink.complete();
        None
    }

    /// Detaches a reader. Returns `false` if it was already gone.
    pub(crate) fn detach(&self, id: u64) -> bool {
        self.detach_then(id, || {})
    }

    /// Like [`Broadcaster::detach`], running `on_detached` while no item can be in routing.
    /// Not run when the reader was already gone.
    pub(crate) fn detach_then(&self, id: u64, on_detached: impl FnOnce()) -> bool {
        let mut taps = self.taps.write();
        let Some(pos) = taps.iter().position(|t| t.id == id) else {
            return false;
        };
        let tap = taps.remove(pos);
        tap.closed.store(true, Ordering::SeqCst);
        on_detached();
        true
    }

    /// Pushes an item to every reader whose filter accepts it.
    pub fn emit(&self, item: T) {
        if self.is_completed() {
            trace!(stream = %self.label, "Emit after completion dropped");
            return;
        }
        self.gate.run(Signal::Next(item), |signal| self.dispatch(signal));
    }

    /// Terminates the broadcaster; every reader is completed exactly once.
    pub fn complete(&self) {
        self.gate.run(Signal::Complete, |signal| self.dispatch(signal));
    }

    fn dispatch(&self, signal: Signal<T>) {
        match signal {
            Signal::Next(item) => {
                if self.is_completed() {
                    return;
                }
                // Route first, under the lock attach and detach take, then deliver.
                let targets: Vec<Arc<Tap<T>>> = self
                    .taps
                    .read()
                    .iter()
                    .filter(|tap| !tap.closed.load(Ordering::SeqCst) && (tap.filter)(&item))
                    .cloned()
                    .collect();
                for tap in targets {
                    // Released while an earlier reader was running.
                    if tap.closed.load(Ordering::SeqCst) {
                        continue;
                    }
                    tap.sink.next(&item);
                }
            }
            Signal::Complete => {
                let taps = {
                    let mut taps = self.taps.write();
                    if self.completed.swap(true, Ordering::SeqCst) {
                        return;
                    }
                    std::mem::take(&mut *taps)
                };
                debug!(stream = %self.label, readers = taps.len(), "Completed");
                for tap in taps {
                    tap.closed.store(true, Ordering::SeqCst);
                    tap.sink.complete();
                }
            }
        }
    }
}

// =============================================================================
// 5. THE SERIALIZATION GATE
// =============================================================================

/// Lets one thread at a time dispatch. Everyone else leaves their signal in `pending`.
struct Gate<T> {
    state: Mutex<GateState<T>>,
}

struct GateState<T> {
    draining: bool,
    pending: VecDeque<Signal<T>>,
}

impl<T> Gate<T> {
    fn new() -> Self {
        Self {
            state: Mutex::new(GateState {
                draining: false,
                pending: VecDeque::new(),
            }),
        }
    }

    fn run(&self, signal: Signal<T>, mut dispatch: impl FnMut(Signal<T>)) {
        {
            let mut state = self.state.lock();
            state.pending.push_back(signal);
            if state.draining {
                return;
            }
            state.draining = true;
        }

        let mut open = GateRelease {
            gate: self,
            armed: true,
        };
        loop {
            let next = {
                let mut state = self.state.lock();
                match state.pending.pop_front() {
                    Some(signal) => signal,
                    None => {
                        // Released under the same lock a late writer checks `draining` with.
                        state.draining = false;
                        open.armed = false;
                        return;
                    }
                }
            };
            dispatch(next);
        }
    }
}

/// Hands the gate back when a reader panics mid-dispatch. Whatever is still pending is
/// delivered by the next writer.
struct GateRelease<'a, T> {
    gate: &'a Gate<T>,
    armed: bool,
}

impl<T> Drop for GateRelease<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            self.gate.state.lock().draining = false;
        }
    }
}

// =============================================================================
// 6. TESTS
// =============================================================================
