//! Badge count synchronization.
//!
//! The [`Synchronizer`] owns the [`CounterCache`] and keeps it eventually
//! consistent with the remote store. Reads are served from the cache; the
//! remote store is queried only on refresh triggers:
//!
//! 1. once when the driver starts,
//! 2. on every [`Notifier`] signal (other tabs, the refresh timer),
//! 3. on session transitions,
//! 4. explicitly via [`Synchronizer::refresh`] and the list loaders.
//!
//! Refresh failures never surface as errors. The failing domain keeps its
//! last known count, a warning is logged and the failure is broadcast on
//! [`Synchronizer::subscribe_failures`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, broadcast, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, instrument};

use basket_sync_core::{CartList, Counters, Delta, Domain, WishlistList};

use crate::config::SyncConfig;
use crate::counter::{CounterCache, Epoch, Snapshot};
use crate::gateway::{GatewayError, RemoteStore};
use crate::mutation::Mutation;
use crate::notifier::{Notifier, Subscription, TabStorage, TimerSource, TriggerSource};
use crate::session::SessionOracle;

const FAILURE_CHANNEL_CAPACITY: usize = 32;

/// Tuning and wiring for a [`Synchronizer`].
#[derive(Clone)]
pub struct SyncOptions {
    /// Period of the refresh timer while signed in.
    pub refresh_interval: Duration,
    /// Unconfirmed adjustments per domain that request a refresh (0 = never).
    pub max_unconfirmed: u32,
    /// This tab's view of the shared storage bus, if other tabs exist.
    pub storage: Option<TabStorage>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(30),
            max_unconfirmed: 3,
            storage: None,
        }
    }
}

impl SyncOptions {
    /// Options taken from the loaded configuration.
    #[must_use]
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            refresh_interval: config.refresh_interval,
            max_unconfirmed: config.max_unconfirmed,
            storage: None,
        }
    }

    /// Announce mutations to, and listen for changes from, other tabs.
    #[must_use]
    pub fn with_storage(mut self, storage: TabStorage) -> Self {
        self.storage = Some(storage);
        self
    }
}

/// A refresh query that failed. The domain kept its previous count.
#[derive(Debug, Clone)]
pub struct RefreshFailure {
    pub domain: Domain,
    pub error: Arc<GatewayError>,
}

/// What a refresh did to one domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainOutcome {
    /// The confirmed count was written.
    Applied(u32),
    /// The query succeeded but the session ended or the cache closed while it
    /// was in flight, so the result was dropped.
    Discarded,
    /// The query failed; the last known count was kept.
    Failed,
    /// No session: the count was reset to zero without a query.
    SignedOut,
    /// The synchronizer has shut down; nothing was queried.
    Closed,
}

/// Per-domain outcome of one [`Synchronizer::refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshReport {
    pub cart: DomainOutcome,
    pub wishlist: DomainOutcome,
}

impl RefreshReport {
    const fn uniform(outcome: DomainOutcome) -> Self {
        Self {
            cart: outcome,
            wishlist: outcome,
        }
    }

    #[must_use]
    pub const fn get(&self, domain: Domain) -> DomainOutcome {
        match domain {
            Domain::Cart => self.cart,
            Domain::Wishlist => self.wishlist,
        }
    }

    /// Whether both domains were confirmed by this refresh.
    #[must_use]
    pub const fn is_confirmed(&self) -> bool {
        matches!(
            (self.cart, self.wishlist),
            (DomainOutcome::Applied(_), DomainOutcome::Applied(_))
        )
    }
}

// =============================================================================
// Synchronizer
// =============================================================================

/// Keeps cart and wishlist badge counts in sync with the remote store.
///
/// Cheaply cloneable; clones share the same cache and triggers. Build one per
/// tab and inject it wherever counts are read or mutations are issued.
pub struct Synchronizer<G, S> {
    inner: Arc<SynchronizerInner<G, S>>,
}

impl<G, S> Clone for Synchronizer<G, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct SynchronizerInner<G, S> {
    gateway: G,
    session: S,
    counters: Arc<CounterCache>,
    notifier: Notifier,
    wake: Arc<Notify>,
    failures: broadcast::Sender<RefreshFailure>,
    options: SyncOptions,
}

impl<G, S> Synchronizer<G, S>
where
    G: RemoteStore,
    S: SessionOracle,
{
    /// Create a synchronizer. Nothing runs until [`start`](Self::start).
    pub fn new(gateway: G, session: S, notifier: Notifier, options: SyncOptions) -> Self {
        let (failures, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);
        let counters = CounterCache::new();
        counters.align(session.generation());
        Self {
            inner: Arc::new(SynchronizerInner {
                gateway,
                session,
                counters: Arc::new(counters),
                notifier,
                wake: Arc::new(Notify::new()),
                failures,
                options,
            }),
        }
    }

    /// Current badge counts. Zero while signed out.
    #[must_use]
    pub fn read(&self) -> Counters {
        let counters = self.counters();
        if self.inner.session.is_authenticated() {
            counters.read()
        } else {
            Counters::ZERO
        }
    }

    /// The cache, reset first if the session changed since it was last used.
    fn counters(&self) -> &CounterCache {
        let counters = &self.inner.counters;
        if counters.align(self.inner.session.generation()) {
            debug!("session generation moved, counts cleared");
        }
        counters
    }

    /// Counts with per-domain freshness.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.counters().snapshot()
    }

    /// Receiver notified whenever the cache changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.counters().subscribe()
    }

    /// Receiver of refresh failures.
    #[must_use]
    pub fn subscribe_failures(&self) -> broadcast::Receiver<RefreshFailure> {
        self.inner.failures.subscribe()
    }

    /// The notifier feeding this synchronizer's triggers.
    #[must_use]
    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    /// Ask the driver for a refresh without waiting for it.
    ///
    /// Requests made while one is already pending collapse into one.
    pub fn request_refresh(&self) {
        self.inner.wake.notify_one();
    }

    /// Apply a local, unconfirmed change to one count, clamped at zero.
    ///
    /// Returns the number of adjustments now awaiting confirmation. Every
    /// `max_unconfirmed` adjustments a refresh is requested.
    pub fn optimistic_adjust(&self, domain: Domain, delta: Delta) -> u32 {
        let pending = self.counters().bump(domain, delta);
        let threshold = self.inner.options.max_unconfirmed;
        if threshold > 0 && pending > 0 && pending % threshold == 0 {
            debug!(domain = %domain, pending, "unconfirmed adjustments reached threshold");
            self.request_refresh();
        }
        pending
    }

    /// Re-derive both counts from the remote store.
    ///
    /// Never fails: see [`RefreshReport`] for what happened to each domain.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> RefreshReport {
        if self.inner.counters.is_closed() {
            return RefreshReport::uniform(DomainOutcome::Closed);
        }
        self.inner.session.revalidate();
        if !self.inner.session.is_authenticated() {
            self.counters().reset();
            return RefreshReport::uniform(DomainOutcome::SignedOut);
        }

        let epoch = self.counters().epoch();
        let (cart, wishlist) = tokio::join!(
            self.inner.gateway.cart_count(),
            self.inner.gateway.wishlist_count()
        );

        let report = match (cart, wishlist) {
            (Ok(cart), Ok(wishlist)) => {
                if self
                    .counters()
                    .set_all_if(epoch, Counters::new(cart, wishlist))
                {
                    RefreshReport {
                        cart: DomainOutcome::Applied(cart),
                        wishlist: DomainOutcome::Applied(wishlist),
                    }
                } else {
                    RefreshReport::uniform(DomainOutcome::Discarded)
                }
            }
            (cart, wishlist) => RefreshReport {
                cart: self.settle(epoch, Domain::Cart, cart),
                wishlist: self.settle(epoch, Domain::Wishlist, wishlist),
            },
        };
        debug!(cart = ?report.cart, wishlist = ?report.wishlist, "refresh finished");
        report
    }

    fn settle(
        &self,
        epoch: Epoch,
        domain: Domain,
        result: Result<u32, GatewayError>,
    ) -> DomainOutcome {
        match result {
            Ok(count) if self.counters().set_if(epoch, domain, count) => {
                DomainOutcome::Applied(count)
            }
            Ok(_) => DomainOutcome::Discarded,
            Err(error) => self.record_failure(domain, error),
        }
    }

    fn record_failure(&self, domain: Domain, error: GatewayError) -> DomainOutcome {
        tracing::warn!(domain = %domain, error = %error, "refresh failed, keeping last known count");
        let outcome = if error.is_session_ended() {
            self.end_session();
            DomainOutcome::SignedOut
        } else {
            DomainOutcome::Failed
        };
        // No subscribers is fine; the warning above is the record.
        let _ = self.inner.failures.send(RefreshFailure {
            domain,
            error: Arc::new(error),
        });
        outcome
    }

    /// Fetch the full cart and confirm the cart count from it.
    ///
    /// # Errors
    ///
    /// Returns the gateway's error. The cached count is left untouched.
    #[instrument(skip(self))]
    pub async fn load_cart(&self) -> Result<CartList, GatewayError> {
        let epoch = self.counters().epoch();
        let cart = self.revealed(self.inner.gateway.list_cart().await)?;
        self.counters().set_if(epoch, Domain::Cart, cart.item_count());
        Ok(cart)
    }

    /// Fetch the full wishlist and confirm the wishlist count from it.
    ///
    /// # Errors
    ///
    /// Returns the gateway's error. The cached count is left untouched.
    #[instrument(skip(self))]
    pub async fn load_wishlist(&self) -> Result<WishlistList, GatewayError> {
        let epoch = self.counters().epoch();
        let wishlist = self.revealed(self.inner.gateway.list_wishlist().await)?;
        self.counters()
            .set_if(epoch, Domain::Wishlist, wishlist.item_count());
        Ok(wishlist)
    }

    fn revealed<T>(&self, result: Result<T, GatewayError>) -> Result<T, GatewayError> {
        if let Err(e) = &result
            && e.is_session_ended()
        {
            self.end_session();
        }
        result
    }

    /// Run a user action.
    ///
    /// The optimistic counter effect is applied before this returns; the
    /// returned future performs the remote call and may be awaited, spawned
    /// or dropped. A failed call is not rolled back locally.
    pub fn perform(
        &self,
        mutation: Mutation,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send + use<G, S> {
        for (domain, delta) in mutation.optimistic_effects() {
            self.optimistic_adjust(domain, delta);
        }

        let this = self.clone();
        async move {
            match mutation.apply(&this.inner.gateway).await {
                Ok(()) => {
                    debug!(action = mutation.name(), "mutation confirmed by remote store");
                    if let Some(storage) = &this.inner.options.storage {
                        for key in mutation.storage_keys() {
                            storage.publish(key);
                        }
                    }
                    if mutation.needs_confirmation() {
                        this.request_refresh();
                    }
                    Ok(())
                }
                Err(e) => {
                    tracing::warn!(action = mutation.name(), error = %e, "mutation failed");
                    if e.is_session_ended() {
                        this.end_session();
                    }
                    Err(e)
                }
            }
        }
    }

    /// React to a session transition.
    fn session_changed(&self, authenticated: bool) {
        if authenticated {
            debug!("session started, refreshing counts");
            self.request_refresh();
        } else {
            self.end_session();
        }
    }

    fn end_session(&self) {
        self.inner.counters.reset();
        tracing::info!("session ended, counts cleared");
    }

    /// Spawn the triggers and the driver task.
    ///
    /// The driver refreshes once immediately, then on every notifier signal,
    /// timer tick (while signed in) and session transition. Stop it with
    /// [`SyncHandle::shutdown`] or by dropping the handle.
    pub fn start(&self) -> SyncHandle {
        let wake = Arc::clone(&self.inner.wake);
        let subscription = self.inner.notifier.subscribe(move || wake.notify_one());

        let weak = Arc::downgrade(&self.inner);
        let mut tasks = vec![
            TimerSource::new(self.inner.options.refresh_interval)
                .gated_by(move || {
                    weak.upgrade()
                        .is_some_and(|inner| inner.session.is_authenticated())
                })
                .spawn(self.inner.notifier.clone()),
        ];
        if let Some(storage) = &self.inner.options.storage {
            tasks.push(storage.source().spawn(self.inner.notifier.clone()));
        }
        tasks.push(tokio::spawn(self.clone().drive()));

        tracing::info!(
            refresh_interval_secs = self.inner.options.refresh_interval.as_secs(),
            cross_tab = self.inner.options.storage.is_some(),
            "synchronizer started"
        );

        SyncHandle {
            tasks,
            subscription: Some(subscription),
            counters: Arc::clone(&self.inner.counters),
        }
    }

    async fn drive(self) {
        let mut session = self.inner.session.watch();
        session.mark_unchanged();
        let mut session_open = true;
        let mut refreshes = JoinSet::new();
        self.spawn_refresh(&mut refreshes);

        loop {
            tokio::select! {
                () = self.inner.wake.notified() => self.spawn_refresh(&mut refreshes),
                changed = session.changed(), if session_open => match changed {
                    Ok(()) => {
                        let authenticated = *session.borrow_and_update();
                        self.session_changed(authenticated);
                    }
                    Err(_) => session_open = false,
                },
                Some(joined) = refreshes.join_next(), if !refreshes.is_empty() => {
                    if let Err(e) = joined
                        && e.is_panic()
                    {
                        tracing::error!(error = %e, "refresh task panicked");
                    }
                }
            }
        }
    }

    fn spawn_refresh(&self, refreshes: &mut JoinSet<()>) {
        let this = self.clone();
        refreshes.spawn(async move {
            this.refresh().await;
        });
    }
}

// =============================================================================
// SyncHandle
// =============================================================================

/// Running synchronizer tasks.
///
/// Stopping aborts the driver and triggers, releases the notifier subscription
/// and closes the cache so in-flight refresh results are dropped. The last
/// counts stay readable.
#[must_use = "dropping the handle stops synchronization"]
pub struct SyncHandle {
    tasks: Vec<JoinHandle<()>>,
    subscription: Option<Subscription>,
    counters: Arc<CounterCache>,
}

impl SyncHandle {
    /// Stop synchronizing.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.counters.close();
        tracing::info!("synchronizer stopped");
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for SyncHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncHandle")
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}
