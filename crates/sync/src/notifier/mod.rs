//! Refresh trigger dispatch.
//!
//! A [`Notifier`] fans payload-free "something changed" signals out to its
//! subscribers. Signals come from pluggable [`TriggerSource`]s (a timer,
//! same-origin storage events, watched files) or from direct
//! [`Notifier::signal`] calls.
//!
//! Delivery is at-least-once and unordered. Nothing is buffered: a handler
//! must treat every signal as "re-derive truth", never as a delta.

mod file;
mod storage;
mod timer;

pub use file::{ChangeMarker, FileWatchSource};
pub use storage::{StorageBus, StorageEvent, StorageKey, StorageSource, TabId, TabStorage};
pub use timer::TimerSource;

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::task::JoinHandle;

type Handler = Arc<dyn Fn() + Send + Sync>;

/// A producer of refresh signals.
///
/// Sources run as background tasks and call [`Notifier::signal`] whenever
/// their underlying event fires. Aborting the returned handle stops the source.
pub trait TriggerSource {
    /// Spawn the source onto the current runtime.
    fn spawn(self, notifier: Notifier) -> JoinHandle<()>;
}

/// Signal dispatcher shared by trigger sources and subscribers.
///
/// Cheaply cloneable; all clones share the same subscriber set.
#[derive(Clone, Default)]
pub struct Notifier {
    inner: Arc<NotifierInner>,
}

#[derive(Default)]
struct NotifierInner {
    handlers: Mutex<BTreeMap<u64, Handler>>,
    next_id: AtomicU64,
}

impl Notifier {
    /// Create a notifier with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. It stays registered until the returned
    /// [`Subscription`] is dropped or unsubscribed.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(handler));
        tracing::trace!(subscription = id, "notifier subscription added");

        Subscription {
            notifier: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Deliver a signal to every current subscriber.
    ///
    /// Handlers run outside the subscriber lock, so a handler may subscribe,
    /// unsubscribe or signal again. A panicking handler is logged and skipped;
    /// the remaining handlers still receive the signal.
    ///
    /// Returns the number of handlers that completed normally.
    pub fn signal(&self) -> usize {
        let handlers: Vec<(u64, Handler)> = self
            .inner
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, handler)| (*id, Arc::clone(handler)))
            .collect();

        let mut delivered = 0;
        for (id, handler) in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler())).is_ok() {
                delivered += 1;
            } else {
                tracing::error!(subscription = id, "notifier handler panicked");
            }
        }
        delivered
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Handle to a registered notifier handler.
///
/// Dropping the subscription unregisters the handler.
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
    notifier: Weak<NotifierInner>,
    id: u64,
}

impl Subscription {
    /// Unregister the handler now.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.notifier.upgrade() {
            inner
                .handlers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&self.id);
            tracing::trace!(subscription = self.id, "notifier subscription released");
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn counting(notifier: &Notifier) -> (Arc<AtomicUsize>, Subscription) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let subscription = notifier.subscribe(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (hits, subscription)
    }

    #[test]
    fn test_signal_reaches_every_subscriber() {
        let notifier = Notifier::new();
        let (a, _sub_a) = counting(&notifier);
        let (b, _sub_b) = counting(&notifier);

        assert_eq!(notifier.signal(), 2);
        assert_eq!(notifier.signal(), 2);
        assert_eq!(a.load(Ordering::SeqCst), 2);
        assert_eq!(b.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dropped_subscription_stops_delivery() {
        let notifier = Notifier::new();
        let (hits, subscription) = counting(&notifier);
        notifier.signal();
        subscription.unsubscribe();
        notifier.signal();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[test]
    fn test_panicking_handler_does_not_block_others() {
        let notifier = Notifier::new();
        let _bad = notifier.subscribe(|| panic!("handler failure"));
        let (hits, _good) = counting(&notifier);

        assert_eq!(notifier.signal(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        // The panicking handler stays registered and keeps being isolated.
        assert_eq!(notifier.signal(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reentrant_signal_from_handler() {
        let notifier = Notifier::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let inner = notifier.clone();
        let _sub = notifier.subscribe(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                inner.signal();
            }
        });

        notifier.signal();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_subscription_outlives_notifier() {
        let notifier = Notifier::new();
        let (_hits, subscription) = counting(&notifier);
        drop(notifier);
        // Must not panic when the dispatcher is already gone.
        drop(subscription);
    }
}
