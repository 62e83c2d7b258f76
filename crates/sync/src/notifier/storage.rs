//! Same-origin storage change broadcast.
//!
//! Models the browser `storage` event: every tab of an origin shares one
//! [`StorageBus`], writes are announced with the writing tab's [`TabId`], and
//! a tab never observes its own writes. Events carry only the key that
//! changed, never the value.

use std::fmt;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{Notifier, TriggerSource};

const DEFAULT_CAPACITY: usize = 64;

/// Identity of one tab/window sharing the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TabId(Uuid);

impl TabId {
    /// A fresh random tab identity.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TabId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted keys whose changes are announced across tabs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StorageKey {
    AuthToken,
    UserData,
    Cart,
    Wishlist,
    Other(String),
}

impl StorageKey {
    /// Whether a change to this key can affect cart or wishlist counts.
    #[must_use]
    pub const fn affects_counts(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// Storage key string as persisted.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::AuthToken => "authToken",
            Self::UserData => "userData",
            Self::Cart => "cart",
            Self::Wishlist => "wishlist",
            Self::Other(key) => key,
        }
    }
}

impl From<&str> for StorageKey {
    fn from(key: &str) -> Self {
        match key {
            "authToken" => Self::AuthToken,
            "userData" => Self::UserData,
            "cart" => Self::Cart,
            "wishlist" => Self::Wishlist,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// A change announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub origin: TabId,
    pub key: StorageKey,
}

/// Broadcast channel shared by all tabs of an origin.
#[derive(Clone)]
pub struct StorageBus {
    sender: broadcast::Sender<StorageEvent>,
}

impl Default for StorageBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl StorageBus {
    /// Create a bus that buffers up to `capacity` events per slow receiver.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Open a new tab on this origin.
    #[must_use]
    pub fn open_tab(&self) -> TabStorage {
        TabStorage {
            bus: self.clone(),
            tab: TabId::new(),
        }
    }

    /// Announce a change. Returns how many receivers were listening.
    pub fn publish(&self, origin: TabId, key: StorageKey) -> usize {
        tracing::trace!(tab = %origin, key = key.as_str(), "storage change published");
        // No receivers is not an error: no other tab is open.
        self.sender
            .send(StorageEvent { origin, key })
            .unwrap_or_default()
    }

    pub(crate) fn receiver(&self) -> broadcast::Receiver<StorageEvent> {
        self.sender.subscribe()
    }
}

/// One tab's view of the shared storage bus.
#[derive(Clone)]
pub struct TabStorage {
    bus: StorageBus,
    tab: TabId,
}

impl TabStorage {
    /// This tab's identity.
    #[must_use]
    pub const fn tab(&self) -> TabId {
        self.tab
    }

    /// Announce that this tab changed `key`.
    pub fn publish(&self, key: StorageKey) -> usize {
        self.bus.publish(self.tab, key)
    }

    /// A trigger source delivering other tabs' count-affecting changes.
    #[must_use]
    pub fn source(&self) -> StorageSource {
        StorageSource {
            receiver: self.bus.receiver(),
            tab: self.tab,
        }
    }
}

/// Turns other tabs' storage events into refresh signals.
///
/// The receiver is created when the source is built, so events published
/// between `source()` and `spawn()` are not lost.
pub struct StorageSource {
    receiver: broadcast::Receiver<StorageEvent>,
    tab: TabId,
}

impl TriggerSource for StorageSource {
    fn spawn(self, notifier: Notifier) -> JoinHandle<()> {
        let Self { mut receiver, tab } = self;
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) if event.origin != tab && event.key.affects_counts() => {
                        tracing::debug!(tab = %tab, key = event.key.as_str(), "storage change from another tab");
                        notifier.signal();
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        // Events carry no payload, so one signal covers all of them.
                        tracing::debug!(tab = %tab, skipped, "storage receiver lagged");
                        notifier.signal();
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    fn watching(tab: &TabStorage) -> (Arc<AtomicUsize>, super::super::Subscription, JoinHandle<()>) {
        let notifier = Notifier::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let subscription = notifier.subscribe(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let task = tab.source().spawn(notifier);
        (hits, subscription, task)
    }

    #[tokio::test]
    async fn test_other_tab_change_signals() {
        let bus = StorageBus::default();
        let tab_a = bus.open_tab();
        let tab_b = bus.open_tab();
        let (hits_b, _sub, task) = watching(&tab_b);

        tab_a.publish(StorageKey::Wishlist);
        settle().await;
        assert_eq!(hits_b.load(Ordering::SeqCst), 1);
        task.abort();
    }

    #[tokio::test]
    async fn test_own_change_is_ignored() {
        let bus = StorageBus::default();
        let tab = bus.open_tab();
        let (hits, _sub, task) = watching(&tab);

        tab.publish(StorageKey::Cart);
        settle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        task.abort();
    }

    #[tokio::test]
    async fn test_unrelated_key_is_ignored() {
        let bus = StorageBus::default();
        let tab_a = bus.open_tab();
        let tab_b = bus.open_tab();
        let (hits_b, _sub, task) = watching(&tab_b);

        tab_a.publish(StorageKey::from("theme"));
        tab_a.publish(StorageKey::from("authToken"));
        settle().await;
        assert_eq!(hits_b.load(Ordering::SeqCst), 1);
        task.abort();
    }

    #[tokio::test]
    async fn test_lagged_receiver_signals_once() {
        let bus = StorageBus::new(2);
        let tab_a = bus.open_tab();
        let tab_b = bus.open_tab();
        // Build the source before publishing so the backlog overflows it.
        let source = tab_b.source();
        for _ in 0..5 {
            tab_a.publish(StorageKey::Cart);
        }

        let notifier = Notifier::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let _sub = notifier.subscribe(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let task = source.spawn(notifier);
        tokio::time::sleep(Duration::from_millis(20)).await;

        // One for the lag notice plus the two events still buffered.
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        task.abort();
    }

    #[test]
    fn test_publish_without_receivers() {
        let bus = StorageBus::default();
        assert_eq!(bus.open_tab().publish(StorageKey::Cart), 0);
    }
}
