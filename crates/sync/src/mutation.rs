//! User actions against the cart and wishlist.
//!
//! A mutation has two independent effects: an optimistic counter adjustment
//! applied immediately, and a remote store call. Either may fail without the
//! other being rolled back; the next refresh reconciles.

use basket_sync_core::{Delta, Domain, LineKey, ProductId};

use crate::gateway::{GatewayError, RemoteStore};
use crate::notifier::StorageKey;

/// A cart or wishlist change requested by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    AddCartItem { key: LineKey, quantity: u32 },
    UpdateCartItem { key: LineKey, quantity: u32 },
    RemoveCartItem { key: LineKey },
    ClearCart,
    AddWishlistItem { key: LineKey },
    RemoveWishlistItem { product_id: ProductId },
    MoveWishlistItemToCart { key: LineKey },
    BulkMoveWishlistToCart { product_ids: Vec<ProductId> },
}

impl Mutation {
    /// Counter adjustments to apply before the remote call completes.
    ///
    /// Badges move by one per action regardless of quantity. Mutations whose
    /// effect on the count cannot be known locally have none and ask for
    /// confirmation instead.
    #[must_use]
    pub fn optimistic_effects(&self) -> Vec<(Domain, Delta)> {
        match self {
            Self::AddCartItem { .. } => vec![(Domain::Cart, Delta::Increment)],
            Self::RemoveCartItem { .. } => vec![(Domain::Cart, Delta::Decrement)],
            Self::AddWishlistItem { .. } => vec![(Domain::Wishlist, Delta::Increment)],
            Self::RemoveWishlistItem { .. } => vec![(Domain::Wishlist, Delta::Decrement)],
            Self::MoveWishlistItemToCart { .. } => vec![
                (Domain::Wishlist, Delta::Decrement),
                (Domain::Cart, Delta::Increment),
            ],
            Self::UpdateCartItem { .. } | Self::ClearCart | Self::BulkMoveWishlistToCart { .. } => {
                Vec::new()
            }
        }
    }

    /// Whether a successful call should be followed by a refresh.
    #[must_use]
    pub const fn needs_confirmation(&self) -> bool {
        matches!(
            self,
            Self::UpdateCartItem { .. } | Self::ClearCart | Self::BulkMoveWishlistToCart { .. }
        )
    }

    /// Domains whose remote state this mutation changes.
    #[must_use]
    pub const fn domains(&self) -> &'static [Domain] {
        match self {
            Self::AddCartItem { .. }
            | Self::UpdateCartItem { .. }
            | Self::RemoveCartItem { .. }
            | Self::ClearCart => &[Domain::Cart],
            Self::AddWishlistItem { .. } | Self::RemoveWishlistItem { .. } => &[Domain::Wishlist],
            Self::MoveWishlistItemToCart { .. } | Self::BulkMoveWishlistToCart { .. } => {
                &[Domain::Wishlist, Domain::Cart]
            }
        }
    }

    /// Storage keys to announce to other tabs once the call succeeds.
    pub(crate) fn storage_keys(&self) -> impl Iterator<Item = StorageKey> {
        self.domains().iter().map(|domain| match domain {
            Domain::Cart => StorageKey::Cart,
            Domain::Wishlist => StorageKey::Wishlist,
        })
    }

    /// Short action name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AddCartItem { .. } => "add_cart_item",
            Self::UpdateCartItem { .. } => "update_cart_item",
            Self::RemoveCartItem { .. } => "remove_cart_item",
            Self::ClearCart => "clear_cart",
            Self::AddWishlistItem { .. } => "add_wishlist_item",
            Self::RemoveWishlistItem { .. } => "remove_wishlist_item",
            Self::MoveWishlistItemToCart { .. } => "move_wishlist_item_to_cart",
            Self::BulkMoveWishlistToCart { .. } => "bulk_move_wishlist_to_cart",
        }
    }

    /// Perform the remote call.
    ///
    /// # Errors
    ///
    /// Returns whatever the gateway returns.
    pub async fn apply<G: RemoteStore>(&self, gateway: &G) -> Result<(), GatewayError> {
        match self {
            Self::AddCartItem { key, quantity } => gateway.add_cart_item(key, *quantity).await,
            Self::UpdateCartItem { key, quantity } => {
                gateway.update_cart_item(key, *quantity).await
            }
            Self::RemoveCartItem { key } => gateway.remove_cart_item(key).await,
            Self::ClearCart => gateway.clear_cart().await,
            Self::AddWishlistItem { key } => gateway.add_wishlist_item(key).await,
            Self::RemoveWishlistItem { product_id } => {
                gateway.remove_wishlist_item(product_id).await
            }
            Self::MoveWishlistItemToCart { key } => gateway.move_wishlist_item_to_cart(key).await,
            Self::BulkMoveWishlistToCart { product_ids } => {
                gateway.bulk_move_wishlist_to_cart(product_ids).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use basket_sync_core::{Size, VariantId};

    use super::*;

    fn key() -> LineKey {
        LineKey::new(ProductId::new("p1"), VariantId::new("v1"), Size::free())
    }

    #[test]
    fn test_move_affects_both_domains() {
        let mutation = Mutation::MoveWishlistItemToCart { key: key() };
        assert_eq!(
            mutation.optimistic_effects(),
            vec![
                (Domain::Wishlist, Delta::Decrement),
                (Domain::Cart, Delta::Increment)
            ]
        );
        assert!(!mutation.needs_confirmation());
        assert_eq!(
            mutation.storage_keys().collect::<Vec<_>>(),
            vec![StorageKey::Wishlist, StorageKey::Cart]
        );
    }

    #[test]
    fn test_add_moves_badge_by_one_regardless_of_quantity() {
        let mutation = Mutation::AddCartItem {
            key: key(),
            quantity: 4,
        };
        assert_eq!(
            mutation.optimistic_effects(),
            vec![(Domain::Cart, Delta::Increment)]
        );
    }

    #[test]
    fn test_unknowable_effects_ask_for_confirmation() {
        for mutation in [
            Mutation::ClearCart,
            Mutation::UpdateCartItem {
                key: key(),
                quantity: 2,
            },
            Mutation::BulkMoveWishlistToCart {
                product_ids: vec![ProductId::new("a"), ProductId::new("b")],
            },
        ] {
            assert!(mutation.optimistic_effects().is_empty(), "{}", mutation.name());
            assert!(mutation.needs_confirmation(), "{}", mutation.name());
        }
    }
}
