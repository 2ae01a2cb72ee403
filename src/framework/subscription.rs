//! Subscription handles.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

type Release = Box<dyn FnOnce() + Send>;

/// A handle to one registration of an observer on a bus topic or an action.
///
/// Handles are cheap to clone and every clone controls the same registration.
/// Dropping a handle does **not** release it; call [`Subscription::unsubscribe`].
#[derive(Clone)]
pub struct Subscription {
    inner: Arc<SubscriptionInner>,
}

struct SubscriptionInner {
    closed: Arc<AtomicBool>,
    release: Mutex<Option<Release>>,
}

impl Subscription {
    /// `closed` is shared with the delivery tap so in-flight dispatches observe the release.
    pub(crate) fn new(closed: Arc<AtomicBool>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            inner: Arc::new(SubscriptionInner {
                closed,
                release: Mutex::new(Some(Box::new(release))),
            }),
        }
    }

    /// A handle that was never live, e.g. returned when subscribing to a terminated stream.
    pub(crate) fn closed() -> Self {
        Self {
            inner: Arc::new(SubscriptionInner {
                closed: Arc::new(AtomicBool::new(true)),
                release: Mutex::new(None),
            }),
        }
    }

    /// Stops delivery to this registration. Calling it again is a no-op.
    pub fn unsubscribe(&self) {
        let release = self.inner.release.lock().take();
        if let Some(release) = release {
            release();
        }
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_unsubscribed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// `true` when both handles control the same registration.
    pub fn same_as(&self, other: &Subscription) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("unsubscribed", &self.is_unsubscribed())
            .finish()
    }
}
