//! Remote store gateway.
//!
//! The remote store is the system of record for carts and wishlists. The
//! sync layer reaches it only through [`RemoteStore`], so the transport can be
//! swapped (the [`HttpGateway`] in production, scripted fakes in tests).
//!
//! Counts are derived from the list queries unless an implementation has a
//! cheaper way to answer them.

mod http;
mod wire;

pub use http::HttpGateway;

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;

use basket_sync_core::{CartList, LineKey, ProductId, WishlistList};

/// Errors that can occur when talking to the remote store.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The request did not complete within the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The remote store rejected the bearer token. The session has ended.
    #[error("Session expired or revoked")]
    Unauthorized,

    /// No user is signed in, so no request was sent.
    #[error("No active session")]
    NoSession,

    /// Rate limited by the remote store.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Any other non-success response.
    #[error("Remote store returned {status}: {message}")]
    Status { status: u16, message: String },

    /// A request path could not be joined onto the base URL.
    #[error("Invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl GatewayError {
    /// Whether this error means the signed-in session is gone.
    #[must_use]
    pub const fn is_session_ended(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

/// Cart and wishlist operations against the system of record.
///
/// All methods act on the signed-in user's collections. Futures are `Send`
/// so calls can be spawned onto the runtime.
pub trait RemoteStore: Send + Sync + 'static {
    /// Total quantity across all cart lines.
    fn cart_count(&self) -> impl Future<Output = Result<u32, GatewayError>> + Send {
        async { self.list_cart().await.map(|cart| cart.item_count()) }
    }

    /// Number of wishlist entries.
    fn wishlist_count(&self) -> impl Future<Output = Result<u32, GatewayError>> + Send {
        async { self.list_wishlist().await.map(|wishlist| wishlist.item_count()) }
    }

    /// All cart lines.
    fn list_cart(&self) -> impl Future<Output = Result<CartList, GatewayError>> + Send;

    /// All wishlist entries.
    fn list_wishlist(&self) -> impl Future<Output = Result<WishlistList, GatewayError>> + Send;

    /// Add `quantity` of a line, merging with an existing line of the same key.
    fn add_cart_item(
        &self,
        key: &LineKey,
        quantity: u32,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Set a line's quantity.
    fn update_cart_item(
        &self,
        key: &LineKey,
        quantity: u32,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Remove a line.
    fn remove_cart_item(&self, key: &LineKey)
    -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Remove every cart line.
    fn clear_cart(&self) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Add a product to the wishlist.
    fn add_wishlist_item(
        &self,
        key: &LineKey,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Remove a product from the wishlist.
    fn remove_wishlist_item(
        &self,
        product_id: &ProductId,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Move one wishlist entry into the cart.
    fn move_wishlist_item_to_cart(
        &self,
        key: &LineKey,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Move several wishlist entries into the cart in one request.
    fn bulk_move_wishlist_to_cart(
        &self,
        product_ids: &[ProductId],
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

impl<T: RemoteStore> RemoteStore for Arc<T> {
    fn cart_count(&self) -> impl Future<Output = Result<u32, GatewayError>> + Send {
        (**self).cart_count()
    }

    fn wishlist_count(&self) -> impl Future<Output = Result<u32, GatewayError>> + Send {
        (**self).wishlist_count()
    }

    fn list_cart(&self) -> impl Future<Output = Result<CartList, GatewayError>> + Send {
        (**self).list_cart()
    }

    fn list_wishlist(&self) -> impl Future<Output = Result<WishlistList, GatewayError>> + Send {
        (**self).list_wishlist()
    }

    fn add_cart_item(
        &self,
        key: &LineKey,
        quantity: u32,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send {
        (**self).add_cart_item(key, quantity)
    }

    fn update_cart_item(
        &self,
        key: &LineKey,
        quantity: u32,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send {
        (**self).update_cart_item(key, quantity)
    }

    fn remove_cart_item(
        &self,
        key: &LineKey,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send {
        (**self).remove_cart_item(key)
    }

    fn clear_cart(&self) -> impl Future<Output = Result<(), GatewayError>> + Send {
        (**self).clear_cart()
    }

    fn add_wishlist_item(
        &self,
        key: &LineKey,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send {
        (**self).add_wishlist_item(key)
    }

    fn remove_wishlist_item(
        &self,
        product_id: &ProductId,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send {
        (**self).remove_wishlist_item(product_id)
    }

    fn move_wishlist_item_to_cart(
        &self,
        key: &LineKey,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send {
        (**self).move_wishlist_item_to_cart(key)
    }

    fn bulk_move_wishlist_to_cart(
        &self,
        product_ids: &[ProductId],
    ) -> impl Future<Output = Result<(), GatewayError>> + Send {
        (**self).bulk_move_wishlist_to_cart(product_ids)
    }
}
