//! Scripted in-memory remote store for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use rust_decimal::Decimal;
use tokio::sync::watch;

use basket_sync_core::{
    Availability, CartItem, CartList, CurrencyCode, Domain, LineKey, Price, ProductId, ProductRef,
    Size, VariantId, WishlistItem, WishlistList,
};

use crate::gateway::{GatewayError, RemoteStore};

#[derive(Debug, Default)]
struct FakeState {
    cart: u32,
    wishlist: u32,
    fail_cart: bool,
    fail_wishlist: bool,
    fail_mutations: bool,
    unauthorized: bool,
    mutations: Vec<&'static str>,
}

/// Remote store whose counts, failures and latency are driven by the test.
pub struct FakeStore {
    state: Mutex<FakeState>,
    open: watch::Sender<bool>,
    queries: AtomicUsize,
}

impl FakeStore {
    pub fn new(cart: u32, wishlist: u32) -> Self {
        let (open, _) = watch::channel(true);
        Self {
            state: Mutex::new(FakeState {
                cart,
                wishlist,
                ..FakeState::default()
            }),
            open,
            queries: AtomicUsize::new(0),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> T {
        f(&mut self.state.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn set_counts(&self, cart: u32, wishlist: u32) {
        self.with_state(|s| {
            s.cart = cart;
            s.wishlist = wishlist;
        });
    }

    pub fn counts(&self) -> (u32, u32) {
        self.with_state(|s| (s.cart, s.wishlist))
    }

    pub fn fail(&self, domain: Domain, failing: bool) {
        self.with_state(|s| match domain {
            Domain::Cart => s.fail_cart = failing,
            Domain::Wishlist => s.fail_wishlist = failing,
        });
    }

    pub fn fail_mutations(&self, failing: bool) {
        self.with_state(|s| s.fail_mutations = failing);
    }

    pub fn reject_token(&self, rejected: bool) {
        self.with_state(|s| s.unauthorized = rejected);
    }

    pub fn mutations(&self) -> Vec<&'static str> {
        self.with_state(|s| s.mutations.clone())
    }

    /// Count queries made so far.
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Hold every subsequent call until [`resume`](Self::resume).
    pub fn pause(&self) {
        self.open.send_replace(false);
    }

    pub fn resume(&self) {
        self.open.send_replace(true);
    }

    async fn gate(&self) {
        let mut open = self.open.subscribe();
        // The sender lives as long as `self`.
        let _ = open.wait_for(|open| *open).await;
    }

    async fn count(&self, domain: Domain) -> Result<u32, GatewayError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.gate().await;
        self.with_state(|s| {
            if s.unauthorized {
                return Err(GatewayError::Unauthorized);
            }
            let (failing, count) = match domain {
                Domain::Cart => (s.fail_cart, s.cart),
                Domain::Wishlist => (s.fail_wishlist, s.wishlist),
            };
            if failing {
                Err(GatewayError::Status {
                    status: 503,
                    message: "unavailable".to_string(),
                })
            } else {
                Ok(count)
            }
        })
    }

    async fn mutation(
        &self,
        name: &'static str,
        effect: impl FnOnce(&mut FakeState),
    ) -> Result<(), GatewayError> {
        self.gate().await;
        self.with_state(|s| {
            if s.unauthorized {
                return Err(GatewayError::Unauthorized);
            }
            if s.fail_mutations {
                return Err(GatewayError::Timeout);
            }
            s.mutations.push(name);
            effect(s);
            Ok(())
        })
    }
}

fn product(id: &str) -> ProductRef {
    ProductRef {
        id: ProductId::new(id),
        name: format!("Product {id}"),
        slug: format!("product-{id}"),
        images: Vec::new(),
        availability: Availability::InStock,
    }
}

fn key(id: &str) -> LineKey {
    LineKey::new(ProductId::new(id), VariantId::new(id), Size::free())
}

impl RemoteStore for FakeStore {
    async fn cart_count(&self) -> Result<u32, GatewayError> {
        self.count(Domain::Cart).await
    }

    async fn wishlist_count(&self) -> Result<u32, GatewayError> {
        self.count(Domain::Wishlist).await
    }

    async fn list_cart(&self) -> Result<CartList, GatewayError> {
        let quantity = self.count(Domain::Cart).await?;
        let items = (quantity > 0)
            .then(|| CartItem {
                key: key("bundle"),
                quantity,
                unit_price: Price::new(Decimal::new(500, 0), CurrencyCode::INR),
                product: product("bundle"),
            })
            .into_iter()
            .collect();
        Ok(CartList { items })
    }

    async fn list_wishlist(&self) -> Result<WishlistList, GatewayError> {
        let total = self.count(Domain::Wishlist).await?;
        let items = (0..total)
            .map(|n| WishlistItem {
                key: key(&format!("w{n}")),
                product: product(&format!("w{n}")),
                added_at: None,
            })
            .collect();
        Ok(WishlistList { items, total })
    }

    async fn add_cart_item(&self, _key: &LineKey, quantity: u32) -> Result<(), GatewayError> {
        self.mutation("add_cart_item", |s| s.cart = s.cart.saturating_add(quantity))
            .await
    }

    async fn update_cart_item(&self, _key: &LineKey, quantity: u32) -> Result<(), GatewayError> {
        self.mutation("update_cart_item", |s| s.cart = quantity).await
    }

    async fn remove_cart_item(&self, _key: &LineKey) -> Result<(), GatewayError> {
        self.mutation("remove_cart_item", |s| s.cart = s.cart.saturating_sub(1))
            .await
    }

    async fn clear_cart(&self) -> Result<(), GatewayError> {
        self.mutation("clear_cart", |s| s.cart = 0).await
    }

    async fn add_wishlist_item(&self, _key: &LineKey) -> Result<(), GatewayError> {
        self.mutation("add_wishlist_item", |s| {
            s.wishlist = s.wishlist.saturating_add(1);
        })
        .await
    }

    async fn remove_wishlist_item(&self, _product_id: &ProductId) -> Result<(), GatewayError> {
        self.mutation("remove_wishlist_item", |s| {
            s.wishlist = s.wishlist.saturating_sub(1);
        })
        .await
    }

    async fn move_wishlist_item_to_cart(&self, _key: &LineKey) -> Result<(), GatewayError> {
        self.mutation("move_wishlist_item_to_cart", |s| {
            s.wishlist = s.wishlist.saturating_sub(1);
            s.cart = s.cart.saturating_add(1);
        })
        .await
    }

    async fn bulk_move_wishlist_to_cart(
        &self,
        product_ids: &[ProductId],
    ) -> Result<(), GatewayError> {
        let moved = u32::try_from(product_ids.len()).unwrap_or(u32::MAX);
        self.mutation("bulk_move_wishlist_to_cart", |s| {
            let moved = moved.min(s.wishlist);
            s.wishlist -= moved;
            s.cart = s.cart.saturating_add(moved);
        })
        .await
    }
}
