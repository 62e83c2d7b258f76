//! Cart and wishlist line items as reported by the remote store.
//!
//! These are read-only snapshots: the remote store owns the collections and
//! the sync layer only ever observes them through list queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::key::LineKey;
use super::price::Price;

/// Product stock availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Availability {
    #[default]
    InStock,
    OutOfStock,
    PreOrder,
}

/// The product a line belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRef {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    /// Image URLs, first one is the primary image.
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub availability: Availability,
}

impl ProductRef {
    /// Primary image URL, if any.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// A cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub key: LineKey,
    /// Always at least 1; a line with zero quantity is removed server-side.
    pub quantity: u32,
    pub unit_price: Price,
    pub product: ProductRef,
}

impl CartItem {
    /// Price of the whole line.
    #[must_use]
    pub fn line_price(&self) -> Price {
        self.unit_price.times(self.quantity)
    }
}

/// A wishlist line. Wishlist lines carry no quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistItem {
    pub key: LineKey,
    pub product: ProductRef,
    pub added_at: Option<DateTime<Utc>>,
}

/// Result of a cart list query.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CartList {
    pub items: Vec<CartItem>,
}

impl CartList {
    /// Badge count: total quantity across lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0_u32, |total, item| total.saturating_add(item.quantity))
    }

    /// Whether the cart has any lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Result of a wishlist list query.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WishlistList {
    pub items: Vec<WishlistItem>,
    /// Server-reported total, which may exceed `items.len()` when paginated.
    pub total: u32,
}

impl WishlistList {
    /// Badge count.
    #[must_use]
    pub const fn item_count(&self) -> u32 {
        self.total
    }
}
