//! Wishlist commands.

use tracing::info;

use basket_sync::Mutation;
use basket_sync_core::ProductId;

use super::cart::perform;
use super::{Context, LineArgs};

/// List wishlist entries and confirm the wishlist count.
///
/// # Errors
///
/// Returns an error if the remote store request fails.
pub async fn list(context: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let wishlist = context.sync.load_wishlist().await?;

    for item in &wishlist.items {
        info!(
            product_id = %item.product.id,
            name = %item.product.name,
            availability = ?item.product.availability,
            added_at = ?item.added_at,
            "Wishlist entry"
        );
    }
    info!(total = wishlist.total, "Wishlist");
    Ok(())
}

/// Add a product.
///
/// # Errors
///
/// Returns an error if the key is invalid or the remote store rejects the call.
pub async fn add(context: &Context, line: &LineArgs) -> Result<(), Box<dyn std::error::Error>> {
    let key = line.key()?;
    perform(context, Mutation::AddWishlistItem { key }).await
}

/// Remove a product.
///
/// # Errors
///
/// Returns an error if the remote store rejects the call.
pub async fn remove(context: &Context, product: String) -> Result<(), Box<dyn std::error::Error>> {
    let product_id = ProductId::new(product);
    perform(context, Mutation::RemoveWishlistItem { product_id }).await
}

/// Move one entry into the cart.
///
/// # Errors
///
/// Returns an error if the key is invalid or the remote store rejects the call.
pub async fn move_to_cart(
    context: &Context,
    line: &LineArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let key = line.key()?;
    perform(context, Mutation::MoveWishlistItemToCart { key }).await
}

/// Move several entries into the cart.
///
/// # Errors
///
/// Returns an error if the remote store rejects the call.
pub async fn bulk_move(
    context: &Context,
    products: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let product_ids = products.into_iter().map(ProductId::new).collect();
    perform(context, Mutation::BulkMoveWishlistToCart { product_ids }).await
}
