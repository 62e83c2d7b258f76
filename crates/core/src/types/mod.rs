//! Core types for Basket Sync.
//!
//! This module provides type-safe wrappers for cart and wishlist concepts.

pub mod domain;
pub mod id;
pub mod item;
pub mod key;
pub mod price;

pub use domain::{Counters, Delta, Domain};
pub use id::*;
pub use item::{Availability, CartItem, CartList, ProductRef, WishlistItem, WishlistList};
pub use key::{LineKey, Size, SizeError};
pub use price::{CurrencyCode, Price};
