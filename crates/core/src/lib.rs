//! Shopfront Core - Shared cart domain types.
//!
//! This crate provides the types shared by every Shopfront component:
//! - `cart` - Shopper-side cart engine (local state, outbox, sync)
//! - `storefront` - Remote cart API backed by `PostgreSQL`
//! - `cli` - Command-line tools for migrations and cart operations
//!
//! # Architecture
//!
//! The core crate contains only types and the pure cart merge rules - no I/O,
//! no database access, no HTTP clients. This keeps it lightweight and allows
//! both sides of the cart sync to agree on the same invariants.
//!
//! # Modules
//!
//! - [`types`] - IDs, prices, variant selections, cart identities and cart lines

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
