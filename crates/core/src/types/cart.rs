//! Cart lines and the rules for merging them.
//!
//! [`CartLines`] owns the invariants every cart representation must hold:
//!
//! - at most one line per (product, variant set, unit price within a cent);
//!   adding a duplicate increments the existing line
//! - every line has a quantity of at least 1
//! - the total unit count is derived from the lines, never stored

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::{LineKey, ProductId, RemoteLineId};
use super::price::{CurrencyCode, Price};
use super::variant::VariantSelection;

/// Errors raised by cart operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// A line must hold at least one unit.
    #[error("quantity must be at least 1")]
    InvalidQuantity,
    /// No line matches the product and variant selection.
    #[error("no cart line for product {0}")]
    LineNotFound(ProductId),
}

/// One line in a shopping cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Idempotency key for this line, minted when the line is first added.
    pub line_key: LineKey,
    /// Backend row ID, present once the line has been read back from the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<RemoteLineId>,
    /// The purchasable product.
    pub product_id: ProductId,
    /// Variant choices identifying the SKU.
    #[serde(default)]
    pub variant_selection: VariantSelection,
    /// Unit price captured when the line was added.
    pub unit_price: Price,
    /// Number of units, always >= 1.
    pub quantity: u32,
    /// When the line was first added.
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    /// Create a new local-only line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` if `quantity` is zero.
    pub fn new(
        product_id: ProductId,
        variant_selection: VariantSelection,
        unit_price: Price,
        quantity: u32,
    ) -> Result<Self, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        Ok(Self {
            line_key: LineKey::generate(),
            remote_id: None,
            product_id,
            variant_selection,
            unit_price,
            quantity,
            added_at: Utc::now(),
        })
    }

    /// Whether this line is for the given product and variant set.
    #[must_use]
    pub fn is_for(&self, product_id: ProductId, selection: &VariantSelection) -> bool {
        self.product_id == product_id && &self.variant_selection == selection
    }

    /// Whether `other` should be merged into this line rather than added.
    #[must_use]
    pub fn same_line_as(&self, other: &Self) -> bool {
        self.is_for(other.product_id, &other.variant_selection)
            && self.unit_price.approx_eq(&other.unit_price)
    }

    /// Price of the whole line.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }
}

/// Result of [`CartLines::update_quantity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuantityChange {
    /// The line now has the new quantity.
    Updated(CartItem),
    /// A quantity of zero removed the line.
    Removed(CartItem),
}

/// A stored row that [`CartLines::fold`] merged into an earlier line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoldedRow {
    /// Key of the row that no longer has a line of its own.
    pub line_key: LineKey,
    /// Key of the line it was merged into.
    pub into: LineKey,
}

/// The ordered set of lines in one cart.
///
/// Serialized as a plain array of lines. Deserializing goes through
/// [`CartLines::from`], so duplicates are merged and empty lines dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<CartItem>", into = "Vec<CartItem>")]
pub struct CartLines {
    items: Vec<CartItem>,
}

impl CartLines {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Lines in the order they were first added.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Consume the cart and return its lines.
    #[must_use]
    pub fn into_items(self) -> Vec<CartItem> {
        self.items
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total units across all lines.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Sum of line totals, or `None` for an empty cart or mixed currencies.
    #[must_use]
    pub fn subtotal(&self) -> Option<Price> {
        let first = self.items.first()?;
        let currency = first.unit_price.currency_code;
        let mut total = Price::new(rust_decimal::Decimal::ZERO, currency);
        for item in &self.items {
            if item.unit_price.currency_code != currency {
                return None;
            }
            total.amount += item.line_total().amount;
        }
        Some(total)
    }

    /// Look up a line by its key.
    #[must_use]
    pub fn get(&self, line_key: LineKey) -> Option<&CartItem> {
        self.items.iter().find(|item| item.line_key == line_key)
    }

    /// Add an item, merging it into a matching line if there is one.
    ///
    /// Returns a snapshot of the line as it stands after the addition. When
    /// merged, the existing line keeps its key, price snapshot and `added_at`.
    pub fn add(&mut self, item: CartItem) -> CartItem {
        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|existing| existing.same_line_as(&item))
        {
            existing.quantity = existing.quantity.saturating_add(item.quantity);
            return existing.clone();
        }

        self.items.push(item.clone());
        item
    }

    /// Remove every line for the product and variant set, whatever its price.
    ///
    /// Returns the removed lines; empty if nothing matched.
    pub fn remove(&mut self, product_id: ProductId, selection: &VariantSelection) -> Vec<CartItem> {
        let (removed, kept) = std::mem::take(&mut self.items)
            .into_iter()
            .partition(|item| item.is_for(product_id, selection));
        self.items = kept;
        removed
    }

    /// Set the quantity of the earliest line for the product and variant set.
    ///
    /// A quantity of zero removes that line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if no line matches.
    pub fn update_quantity(
        &mut self,
        product_id: ProductId,
        selection: &VariantSelection,
        quantity: u32,
    ) -> Result<QuantityChange, CartError> {
        let index = self
            .items
            .iter()
            .position(|item| item.is_for(product_id, selection))
            .ok_or(CartError::LineNotFound(product_id))?;

        if quantity == 0 {
            return Ok(QuantityChange::Removed(self.items.remove(index)));
        }

        let line = self
            .items
            .get_mut(index)
            .ok_or(CartError::LineNotFound(product_id))?;
        line.quantity = quantity;
        Ok(QuantityChange::Updated(line.clone()))
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Currency of the first line, if any.
    #[must_use]
    pub fn currency(&self) -> Option<CurrencyCode> {
        self.items.first().map(|item| item.unit_price.currency_code)
    }
}

impl CartLines {
    /// Build a cart from stored rows, merging duplicates and dropping empty rows.
    ///
    /// Also returns every row whose `line_key` did not survive the merge, so
    /// the store holding the rows can be brought in line with the result.
    #[must_use]
    pub fn fold(rows: Vec<CartItem>) -> (Self, Vec<FoldedRow>) {
        let mut lines = Self::new();
        let mut folded = Vec::new();
        for row in rows.into_iter().filter(|row| row.quantity > 0) {
            let line_key = row.line_key;
            let line = lines.add(row);
            if line.line_key != line_key {
                folded.push(FoldedRow {
                    line_key,
                    into: line.line_key,
                });
            }
        }
        (lines, folded)
    }
}

impl From<Vec<CartItem>> for CartLines {
    /// Build a cart from raw lines, merging duplicates and dropping empty lines.
    fn from(items: Vec<CartItem>) -> Self {
        Self::fold(items).0
    }
}

impl From<CartLines> for Vec<CartItem> {
    fn from(lines: CartLines) -> Self {
        lines.items
    }
}

impl<'a> IntoIterator for &'a CartLines {
    type Item = &'a CartItem;
    type IntoIter = std::slice::Iter<'a, CartItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
