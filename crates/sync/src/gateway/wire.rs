//! JSON shapes of the remote store's REST API.
//!
//! Responses are decoded into these DTOs and converted to core types, so the
//! rest of the crate never sees `_id` or optional-variant quirks.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use basket_sync_core::{
    Availability, CartItem, CartList, CurrencyCode, LineKey, Price, ProductId, ProductRef, Size,
    VariantId, WishlistItem, WishlistList,
};

// =============================================================================
// Requests
// =============================================================================

/// Body of `cart/add` and `cart/update`. `cart/remove` sends the bare key.
#[derive(Debug, Serialize)]
pub struct CartLineBody<'a> {
    #[serde(flatten)]
    pub key: &'a LineKey,
    pub quantity: u32,
}

/// Body of `wishlist/add` and `wishlist/move-to-cart`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductBody<'a> {
    pub product_id: &'a str,
}

/// Body of `wishlist/bulk-move-to-cart`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductsBody<'a> {
    pub product_ids: Vec<&'a str>,
}

/// Error body returned with non-success statuses.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

// =============================================================================
// Responses
// =============================================================================

/// Product summary embedded in cart and wishlist lines.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireProduct {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub availability: Option<Availability>,
}

impl WireProduct {
    fn into_ref(self) -> ProductRef {
        ProductRef {
            id: ProductId::new(self.id),
            name: self.name,
            slug: self.slug,
            images: self.images,
            availability: self.availability.unwrap_or_default(),
        }
    }
}

/// Builds the composite key of a line. Lines without a variant use the
/// product id; lines without a usable size are free-size.
fn line_key(product_id: &str, variant_id: Option<String>, size: Option<&str>) -> LineKey {
    LineKey::new(
        ProductId::new(product_id),
        VariantId::new(variant_id.unwrap_or_else(|| product_id.to_owned())),
        size.and_then(|s| Size::parse(s).ok()).unwrap_or_else(Size::free),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireCartItem {
    pub product: WireProduct,
    #[serde(default)]
    pub variant_id: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    pub quantity: u32,
    /// Line unit price when it differs from the product's list price.
    #[serde(default)]
    pub price: Option<Decimal>,
}

impl WireCartItem {
    pub fn into_item(self) -> CartItem {
        let key = line_key(&self.product.id, self.variant_id, self.size.as_deref());
        let amount = self.price.unwrap_or(self.product.price);
        CartItem {
            key,
            quantity: self.quantity,
            unit_price: Price::new(amount, CurrencyCode::INR),
            product: self.product.into_ref(),
        }
    }
}

/// `cart/list` returns either `{ "items": [...] }` or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CartListResponse {
    Wrapped { items: Vec<WireCartItem> },
    Bare(Vec<WireCartItem>),
}

impl CartListResponse {
    pub fn into_items(self) -> Vec<WireCartItem> {
        match self {
            Self::Wrapped { items } | Self::Bare(items) => items,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireWishlistItem {
    pub product: WireProduct,
    #[serde(default)]
    pub added_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub variant_id: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
}

impl WireWishlistItem {
    fn into_item(self) -> WishlistItem {
        WishlistItem {
            key: line_key(&self.product.id, self.variant_id, self.size.as_deref()),
            added_at: self.added_at,
            product: self.product.into_ref(),
        }
    }
}

/// `wishlist/list` response.
#[derive(Debug, Deserialize)]
pub struct WishlistResponse {
    #[serde(default)]
    pub items: Vec<WireWishlistItem>,
    #[serde(default)]
    pub total: Option<u32>,
}

impl WishlistResponse {
    /// Converts to the core list. A missing `total` falls back to the item count.
    pub fn into_list(self) -> WishlistList {
        let items: Vec<WishlistItem> = self
            .items
            .into_iter()
            .map(WireWishlistItem::into_item)
            .collect();
        let total = self
            .total
            .unwrap_or_else(|| u32::try_from(items.len()).unwrap_or(u32::MAX));
        WishlistList { items, total }
    }
}

/// Per-variant images of a product.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireVariant {
    pub variant_id: String,
    #[serde(default)]
    pub images: Vec<String>,
}

/// `products/{id}` response, reduced to what image enrichment needs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    #[serde(default)]
    pub variants: Vec<WireVariant>,
    #[serde(default)]
    pub all_images: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

impl ProductDetail {
    /// Images for `variant`, else the product's full gallery.
    pub fn images_for(&self, variant: &VariantId) -> Vec<String> {
        self.variants
            .iter()
            .find(|v| v.variant_id == variant.as_str() && !v.images.is_empty())
            .map(|v| v.images.clone())
            .or_else(|| (!self.all_images.is_empty()).then(|| self.all_images.clone()))
            .unwrap_or_else(|| self.images.clone())
    }
}

/// Build a cart list from decoded lines.
pub fn cart_list(items: Vec<WireCartItem>) -> CartList {
    CartList {
        items: items.into_iter().map(WireCartItem::into_item).collect(),
    }
}
