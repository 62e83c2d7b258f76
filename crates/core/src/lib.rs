//! Basket Sync Core - Shared cart and wishlist types.
//!
//! This crate provides the types shared by every Basket Sync component:
//! - `sync` - Counter cache, synchronizer and remote store gateway
//! - `cli` - Command-line driver for a live remote store
//! - `integration-tests` - End-to-end tests against a fake remote store
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no async
//! runtime. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, composite line keys, counters, items and prices

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
