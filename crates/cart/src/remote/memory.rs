//! In-process remote store.
//!
//! Behaves like the storefront API (idempotent line upserts keyed by
//! `line_key`, backend row IDs assigned on insert) and can be switched into an
//! unavailable or rate-limited state to exercise retry paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use shopfront_core::{CartIdentity, CartItem, CartLines, LineKey, RemoteLineId};

use super::{RemoteCartStore, RemoteError};

/// Remote cart store held in memory.
#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    carts: Mutex<HashMap<String, Vec<CartItem>>>,
    unavailable: AtomicBool,
    rate_limit_secs: AtomicU64,
    next_row_id: AtomicI32,
    writes: AtomicU64,
}

impl MemoryRemoteStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the cart for `identity` with `lines`, replacing anything stored.
    pub fn seed(&self, identity: &CartIdentity, lines: &CartLines) {
        let items = lines
            .items()
            .iter()
            .cloned()
            .map(|mut item| {
                item.remote_id = Some(self.next_id());
                item
            })
            .collect();
        self.lock().insert(identity.storage_key(), items);
    }

    /// Current lines of the cart for `identity`, duplicate rows folded together.
    #[must_use]
    pub fn snapshot(&self, identity: &CartIdentity) -> CartLines {
        CartLines::from(self.rows(identity))
    }

    /// Stored rows of the cart for `identity`, one per `line_key`.
    #[must_use]
    pub fn rows(&self, identity: &CartIdentity) -> Vec<CartItem> {
        self.lock()
            .get(&identity.storage_key())
            .cloned()
            .unwrap_or_default()
    }

    /// Make every call fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Answer every call with `RateLimited(secs)`, or stop doing so with `None`.
    pub fn set_rate_limited(&self, retry_after_secs: Option<u64>) {
        self.rate_limit_secs
            .store(retry_after_secs.unwrap_or(0), Ordering::SeqCst);
    }

    /// Number of successful write calls.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), RemoteError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("memory store offline".to_string()));
        }
        match self.rate_limit_secs.load(Ordering::SeqCst) {
            0 => Ok(()),
            secs => Err(RemoteError::RateLimited(secs)),
        }
    }

    fn next_id(&self) -> RemoteLineId {
        RemoteLineId::new(self.next_row_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<CartItem>>> {
        self.carts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RemoteCartStore for MemoryRemoteStore {
    async fn fetch_cart(&self, identity: &CartIdentity) -> Result<Vec<CartItem>, RemoteError> {
        self.check_available()?;
        Ok(self.rows(identity))
    }

    async fn upsert_line(&self, identity: &CartIdentity, line: &CartItem) -> Result<(), RemoteError> {
        self.check_available()?;
        {
            let mut carts = self.lock();
            let items = carts.entry(identity.storage_key()).or_default();
            if let Some(existing) = items.iter_mut().find(|i| i.line_key == line.line_key) {
                existing.quantity = line.quantity;
            } else {
                let mut stored = line.clone();
                stored.remote_id = Some(self.next_id());
                items.push(stored);
            }
        }
        self.record_write();
        Ok(())
    }

    async fn delete_line(&self, identity: &CartIdentity, line_key: LineKey) -> Result<(), RemoteError> {
        self.check_available()?;
        if let Some(items) = self.lock().get_mut(&identity.storage_key()) {
            items.retain(|i| i.line_key != line_key);
        }
        self.record_write();
        Ok(())
    }

    async fn clear_cart(&self, identity: &CartIdentity) -> Result<(), RemoteError> {
        self.check_available()?;
        self.lock().remove(&identity.storage_key());
        self.record_write();
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use shopfront_core::{CurrencyCode, CustomerId, Price, ProductId, VariantSelection};

    fn line(quantity: u32) -> CartItem {
        CartItem::new(
            ProductId::new(1),
            VariantSelection::none(),
            Price::from_cents(999, CurrencyCode::USD),
            quantity,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = MemoryRemoteStore::new();
        let identity = CartIdentity::Authenticated(CustomerId::new(1));
        let item = line(2);

        store.upsert_line(&identity, &item).await.unwrap();
        store.upsert_line(&identity, &item).await.unwrap();

        let rows = store.fetch_cart(&identity).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity, 2);
        assert!(rows[0].remote_id.is_some());
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let store = MemoryRemoteStore::new();
        let identity = CartIdentity::Authenticated(CustomerId::new(1));
        let a = line(1);
        let mut b = line(1);
        b.product_id = ProductId::new(2);

        store.upsert_line(&identity, &a).await.unwrap();
        store.upsert_line(&identity, &b).await.unwrap();
        store.delete_line(&identity, a.line_key).await.unwrap();
        assert_eq!(store.snapshot(&identity).len(), 1);

        store.clear_cart(&identity).await.unwrap();
        assert!(store.snapshot(&identity).is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_fails_calls() {
        let store = MemoryRemoteStore::new();
        let identity = CartIdentity::Authenticated(CustomerId::new(1));
        store.set_unavailable(true);

        assert!(matches!(
            store.fetch_cart(&identity).await,
            Err(RemoteError::Unavailable(_))
        ));
        assert!(store.upsert_line(&identity, &line(1)).await.is_err());
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_rate_limited_reports_retry_after() {
        let store = MemoryRemoteStore::new();
        let identity = CartIdentity::Authenticated(CustomerId::new(1));
        store.set_rate_limited(Some(7));

        let err = store.upsert_line(&identity, &line(1)).await.unwrap_err();
        assert_eq!(err.retry_after(), Some(std::time::Duration::from_secs(7)));

        store.set_rate_limited(None);
        assert!(store.upsert_line(&identity, &line(1)).await.is_ok());
    }
}
