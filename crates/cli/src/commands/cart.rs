//! Cart commands.

use tracing::info;

use basket_sync::Mutation;

use super::{Context, LineArgs};

/// List cart lines and confirm the cart count.
///
/// # Errors
///
/// Returns an error if the remote store request fails.
pub async fn list(context: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let cart = context.sync.load_cart().await?;

    for item in &cart.items {
        info!(
            key = %item.key,
            name = %item.product.name,
            quantity = item.quantity,
            line_price = %item.line_price(),
            image = item.product.primary_image().unwrap_or("-"),
            "Cart line"
        );
    }
    info!(lines = cart.items.len(), count = cart.item_count(), "Cart");
    Ok(())
}

/// Add a line.
///
/// # Errors
///
/// Returns an error if the key is invalid or the remote store rejects the call.
pub async fn add(
    context: &Context,
    line: &LineArgs,
    quantity: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    if quantity == 0 {
        return Err("quantity must be at least 1".into());
    }
    let key = line.key()?;
    perform(context, Mutation::AddCartItem { key, quantity }).await
}

/// Set a line's quantity.
///
/// # Errors
///
/// Returns an error if the key is invalid or the remote store rejects the call.
pub async fn update(
    context: &Context,
    line: &LineArgs,
    quantity: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let key = line.key()?;
    perform(context, Mutation::UpdateCartItem { key, quantity }).await
}

/// Remove a line.
///
/// # Errors
///
/// Returns an error if the key is invalid or the remote store rejects the call.
pub async fn remove(context: &Context, line: &LineArgs) -> Result<(), Box<dyn std::error::Error>> {
    let key = line.key()?;
    perform(context, Mutation::RemoveCartItem { key }).await
}

/// Remove every line.
///
/// # Errors
///
/// Returns an error if the remote store rejects the call.
pub async fn clear(context: &Context) -> Result<(), Box<dyn std::error::Error>> {
    perform(context, Mutation::ClearCart).await
}

/// Run a mutation, then report the confirmed counts.
pub(super) async fn perform(
    context: &Context,
    mutation: Mutation,
) -> Result<(), Box<dyn std::error::Error>> {
    let action = mutation.name();
    context.sync.perform(mutation).await?;
    context.announce_change();
    info!(action, "Done");

    context.sync.refresh().await;
    let counts = context.sync.read();
    info!(
        cart = counts.cart_count,
        wishlist = counts.wishlist_count,
        "Badge counts"
    );
    Ok(())
}
