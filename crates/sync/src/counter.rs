//! In-memory badge counter cache.
//!
//! Holds the cart and wishlist counts plus, per domain, whether the value has
//! been confirmed by the remote store. Every operation is synchronous and
//! infallible; the cache never touches the network.
//!
//! Writes that follow a network round-trip are guarded by an [`Epoch`]: the
//! caller captures the epoch before suspending and the write is dropped if the
//! epoch moved in the meantime (session ended, cache closed).
//!
//! The cache also records the session generation its counts belong to.
//! [`CounterCache::align`] resets it as soon as that generation is stale.

use tokio::sync::watch;

use basket_sync_core::{Counters, Delta, Domain};

/// How much a domain's count can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Freshness {
    /// Never confirmed since start or since the session last ended.
    #[default]
    Unknown,
    /// Last written by a successful remote query.
    Confirmed,
    /// Locally adjusted `pending` times since the last confirmation.
    Unconfirmed { pending: u32 },
}

/// Cache generation. Advanced whenever cached state must be invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Epoch(u64);

/// A consistent view of the whole cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Snapshot {
    pub counters: Counters,
    pub cart: Freshness,
    pub wishlist: Freshness,
    epoch: Epoch,
    session: u64,
    closed: bool,
}

impl Snapshot {
    /// Freshness of one domain.
    #[must_use]
    pub const fn freshness(&self, domain: Domain) -> Freshness {
        match domain {
            Domain::Cart => self.cart,
            Domain::Wishlist => self.wishlist,
        }
    }

    const fn freshness_mut(&mut self, domain: Domain) -> &mut Freshness {
        match domain {
            Domain::Cart => &mut self.cart,
            Domain::Wishlist => &mut self.wishlist,
        }
    }

    const fn clear(&mut self) {
        self.counters = Counters::ZERO;
        self.cart = Freshness::Unknown;
        self.wishlist = Freshness::Unknown;
        self.epoch = Epoch(self.epoch.0.wrapping_add(1));
    }
}

/// The counter cache.
///
/// Backed by a `watch` channel so renderers can subscribe to changes while
/// reads stay synchronous.
#[derive(Debug)]
pub struct CounterCache {
    state: watch::Sender<Snapshot>,
}

impl Default for CounterCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterCache {
    /// A cache with both counts `Unknown` (rendered as zero).
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(Snapshot::default());
        Self { state }
    }

    /// Current counts.
    #[must_use]
    pub fn read(&self) -> Counters {
        self.state.borrow().counters
    }

    /// Current counts, freshness and epoch.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        *self.state.borrow()
    }

    /// Current epoch, captured before a guarded write's network call.
    #[must_use]
    pub fn epoch(&self) -> Epoch {
        self.state.borrow().epoch
    }

    /// Whether the cache has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }

    /// Receiver notified on every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.state.subscribe()
    }

    /// Overwrite both counts and mark them confirmed.
    pub fn set_all(&self, counters: Counters) {
        self.state.send_modify(|snapshot| {
            snapshot.counters = counters;
            snapshot.cart = Freshness::Confirmed;
            snapshot.wishlist = Freshness::Confirmed;
        });
    }

    /// Overwrite one count and mark it confirmed.
    pub fn set(&self, domain: Domain, count: u32) {
        self.state.send_modify(|snapshot| {
            snapshot.counters.set(domain, count);
            *snapshot.freshness_mut(domain) = Freshness::Confirmed;
        });
    }

    /// [`set_all`](Self::set_all), unless the epoch moved since `epoch`.
    ///
    /// Returns whether the write was applied.
    pub fn set_all_if(&self, epoch: Epoch, counters: Counters) -> bool {
        self.state.send_if_modified(|snapshot| {
            if snapshot.epoch != epoch || snapshot.closed {
                return false;
            }
            snapshot.counters = counters;
            snapshot.cart = Freshness::Confirmed;
            snapshot.wishlist = Freshness::Confirmed;
            true
        })
    }

    /// [`set`](Self::set), unless the epoch moved since `epoch`.
    ///
    /// Returns whether the write was applied.
    pub fn set_if(&self, epoch: Epoch, domain: Domain, count: u32) -> bool {
        self.state.send_if_modified(|snapshot| {
            if snapshot.epoch != epoch || snapshot.closed {
                return false;
            }
            snapshot.counters.set(domain, count);
            *snapshot.freshness_mut(domain) = Freshness::Confirmed;
            true
        })
    }

    /// Apply a local delta, clamped at zero.
    ///
    /// Returns the number of unconfirmed adjustments now pending for the
    /// domain. A closed cache ignores bumps and returns zero.
    pub fn bump(&self, domain: Domain, delta: Delta) -> u32 {
        let mut pending = 0;
        self.state.send_if_modified(|snapshot| {
            if snapshot.closed {
                return false;
            }
            snapshot.counters.bump(domain, delta);
            let freshness = snapshot.freshness_mut(domain);
            pending = match *freshness {
                Freshness::Unconfirmed { pending } => pending.saturating_add(1),
                Freshness::Unknown | Freshness::Confirmed => 1,
            };
            *freshness = Freshness::Unconfirmed { pending };
            true
        });
        pending
    }

    /// Zero both counts, forget freshness and advance the epoch.
    ///
    /// Pending optimistic adjustments are discarded and in-flight guarded
    /// writes will be dropped.
    pub fn reset(&self) {
        self.state.send_modify(Snapshot::clear);
    }

    /// Adopt session `generation`, resetting if the counts belong to another.
    ///
    /// Returns whether a reset happened.
    pub fn align(&self, generation: u64) -> bool {
        self.state.send_if_modified(|snapshot| {
            if snapshot.session == generation {
                return false;
            }
            snapshot.clear();
            snapshot.session = generation;
            true
        })
    }

    /// Stop accepting guarded writes and bumps. The last value stays readable.
    pub fn close(&self) {
        self.state.send_if_modified(|snapshot| {
            if snapshot.closed {
                return false;
            }
            snapshot.closed = true;
            snapshot.epoch = Epoch(snapshot.epoch.0.wrapping_add(1));
            true
        });
    }
}
