//! # Mock Framework
//!
//! Utilities for testing buses and resources without writing a bespoke observer per test.
//!
//! [`RecordingObserver`] remembers every event it receives together with the thread
//! it was delivered on, counts completions, and collects errors reported by its async
//! worker. Async tests wait on it with [`RecordingObserver::wait_for`] instead of sleeping.
//!
//! # Example
//! ```ignore
//! let rec = RecordingObserver::new("fares");
//! bus.subscribe("fares", DeliveryMode::Async, rec.clone())?;
//! bus.publish("fares", Event::named("quote")?);
//!
//! assert!(rec.wait_for(1, Duration::from_secs(1)).await);
//! assert!(rec.delivered_on_other_thread());
//! rec.verify();
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::core::Observer;
use crate::model::Event;

/// One recorded delivery.
#[derive(Debug, Clone)]
pub struct Delivered {
    pub event: Event,
    pub thread: ThreadId,
}

/// An [`Observer`] that records everything it sees.
pub struct RecordingObserver {
    label: String,
    created_on: ThreadId,
    delivered: Mutex<Vec<Delivered>>,
    completions: AtomicUsize,
    errors: Mutex<Vec<String>>,
    changed: Notify,
}

impl RecordingObserver {
    /// Creates a recorder owned by the calling thread.
    pub fn new(label: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
            created_on: thread::current().id(),
            delivered: Mutex::new(Vec::new()),
            completions: AtomicUsize::new(0),
            errors: Mutex::new(Vec::new()),
            changed: Notify::new(),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn events(&self) -> Vec<Event> {
        self.delivered.lock().iter().map(|d| d.event.clone()).collect()
    }

    /// Names of the received events, in arrival order.
    pub fn names(&self) -> Vec<String> {
        self.delivered
            .lock()
            .iter()
            .map(|d| d.event.name().to_string())
            .collect()
    }

    pub fn deliveries(&self) -> Vec<Delivered> {
        self.delivered.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.delivered.lock().len()
    }

    /// How many times `on_complete` fired.
    pub fn completed(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }

    /// `true` if at least one event arrived on a thread other than the creator's.
    pub fn delivered_on_other_thread(&self) -> bool {
        self.delivered
            .lock()
            .iter()
            .any(|d| d.thread != self.created_on)
    }

    /// `true` if every event arrived on the creator's thread.
    pub fn delivered_on_creating_thread(&self) -> bool {
        self.delivered
            .lock()
            .iter()
            .all(|d| d.thread == self.created_on)
    }

    /// Waits until at least `n` events were recorded. Returns `false` on timeout.
    pub async fn wait_for(&self, n: usize, timeout: Duration) -> bool {
        self.wait_until(timeout, || self.count() >= n).await
    }

    /// Waits for the first completion. Returns `false` on timeout.
    pub async fn wait_for_completion(&self, timeout: Duration) -> bool {
        self.wait_until(timeout, || self.completed() > 0).await
    }

    async fn wait_until(&self, timeout: Duration, done: impl Fn() -> bool) -> bool {
        let waiting = async {
            loop {
                let changed = self.changed.notified();
                if done() {
                    return;
                }
                changed.await;
            }
        };
        tokio::time::timeout(timeout, waiting).await.is_ok()
    }

    /// Panics if any error was reported.
    pub fn verify(&self) {
        let errors = self.errors.lock();
        if !errors.is_empty() {
            panic!("{} reported {} error(s): {:?}", self.label, errors.len(), *errors);
        }
    }
}

impl Observer for RecordingObserver {
    fn on_event(&self, event: &Event) {
        self.delivered.lock().push(Delivered {
            event: event.clone(),
            thread: thread::current().id(),
        });
        self.changed.notify_waiters();
    }

    fn on_complete(&self) {
        self.completions.fetch_add(1, Ordering::SeqCst);
        self.changed.notify_waiters();
    }

    fn on_error(&self, cause: &(dyn std::error::Error + Send + Sync + 'static)) {
        self.errors.lock().push(cause.to_string());
        self.changed.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_in_order_on_calling_thread() {
        let rec = RecordingObserver::new("direct");
        rec.on_event(&Event::named("a").unwrap());
        rec.on_event(&Event::named("b").unwrap());
        rec.on_complete();

        assert_eq!(rec.names(), vec!["a", "b"]);
        assert_eq!(rec.completed(), 1);
        assert!(rec.delivered_on_creating_thread());
        assert!(!rec.delivered_on_other_thread());
        rec.verify();
    }

    #[tokio::test]
    async fn test_wait_for_times_out() {
        let rec = RecordingObserver::new("idle");
        assert!(!rec.wait_for(1, Duration::from_millis(20)).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_wait_for_wakes_on_delivery() {
        let rec = RecordingObserver::new("remote");
        let remote = rec.clone();
        std::thread::spawn(move || remote.on_event(&Event::named("x").unwrap()));

        assert!(rec.wait_for(1, Duration::from_secs(2)).await);
        assert!(rec.delivered_on_other_thread());
    }
}
