//! JSON bodies exchanged with the storefront cart API.

use serde::{Deserialize, Serialize};

use super::cart::CartItem;
use super::identity::CartIdentity;

/// A cart as returned by `GET /api/carts/{identity}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartResponse {
    /// Storage key of the cart's identity.
    pub identity: String,
    /// Stored rows in insertion order, one per `line_key`.
    pub items: Vec<CartItem>,
    /// Total units, derived from `items`.
    pub item_count: u64,
}

impl CartResponse {
    /// Build a response for an identity's stored rows.
    #[must_use]
    pub fn new(identity: &CartIdentity, items: Vec<CartItem>) -> Self {
        let item_count = items.iter().map(|item| u64::from(item.quantity)).sum();
        Self {
            identity: identity.storage_key(),
            items,
            item_count,
        }
    }
}
