//! In-process cart storage for development and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use shopfront_core::{CartItem, LineKey, RemoteLineId};

/// Carts held in a map keyed by identity key.
#[derive(Debug, Default)]
pub struct MemoryCartBackend {
    carts: Mutex<HashMap<String, Vec<CartItem>>>,
    next_row_id: AtomicI32,
}

impl MemoryCartBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn fetch(&self, identity_key: &str) -> Vec<CartItem> {
        self.lock().get(identity_key).cloned().unwrap_or_default()
    }

    pub(super) fn upsert_line(&self, identity_key: &str, line: &CartItem) -> CartItem {
        let mut carts = self.lock();
        let items = carts.entry(identity_key.to_string()).or_default();

        if let Some(existing) = items.iter_mut().find(|i| i.line_key == line.line_key) {
            existing.quantity = line.quantity;
            return existing.clone();
        }

        let mut stored = line.clone();
        stored.remote_id = Some(RemoteLineId::new(
            self.next_row_id.fetch_add(1, Ordering::SeqCst) + 1,
        ));
        items.push(stored.clone());
        stored
    }

    pub(super) fn delete_line(&self, identity_key: &str, line_key: LineKey) -> bool {
        let mut carts = self.lock();
        let Some(items) = carts.get_mut(identity_key) else {
            return false;
        };
        let before = items.len();
        items.retain(|i| i.line_key != line_key);
        items.len() < before
    }

    pub(super) fn clear(&self, identity_key: &str) -> u64 {
        self.lock()
            .remove(identity_key)
            .map_or(0, |items| u64::try_from(items.len()).unwrap_or(u64::MAX))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<CartItem>>> {
        self.carts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use shopfront_core::{CurrencyCode, Price, ProductId, VariantSelection};

    fn line(quantity: u32) -> CartItem {
        CartItem::new(
            ProductId::new(5),
            VariantSelection::none(),
            Price::from_cents(250, CurrencyCode::EUR),
            quantity,
        )
        .unwrap()
    }

    #[test]
    fn test_upsert_overwrites_quantity() {
        let backend = MemoryCartBackend::new();
        let mut item = line(1);

        let first = backend.upsert_line("customer:1", &item);
        item.quantity = 4;
        let second = backend.upsert_line("customer:1", &item);

        assert_eq!(first.remote_id, second.remote_id);
        let rows = backend.fetch("customer:1");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity, 4);
    }

    #[test]
    fn test_fetch_keeps_rows_with_distinct_keys() {
        let backend = MemoryCartBackend::new();
        backend.upsert_line("customer:1", &line(2));
        backend.upsert_line("customer:1", &line(1));

        assert_eq!(backend.fetch("customer:1").len(), 2);
    }

    #[test]
    fn test_delete_missing_line() {
        let backend = MemoryCartBackend::new();
        assert!(!backend.delete_line("customer:1", LineKey::generate()));

        let item = line(1);
        backend.upsert_line("customer:1", &item);
        assert!(backend.delete_line("customer:1", item.line_key));
        assert!(!backend.delete_line("customer:1", item.line_key));
    }
}
