//! Core types for Shopfront.
//!
//! This module provides type-safe wrappers for the cart domain.

pub mod api;
pub mod cart;
pub mod id;
pub mod identity;
pub mod price;
pub mod variant;

pub use api::CartResponse;
pub use cart::{CartError, CartItem, CartLines, FoldedRow, QuantityChange};
pub use id::*;
pub use identity::{CartIdentity, IdentityParseError};
pub use price::{CurrencyCode, PRICE_EPSILON, Price, UnknownCurrency};
pub use variant::{VariantChoice, VariantSelection};
