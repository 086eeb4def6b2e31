//! Cart reconciliation between the local cart and the remote cart.
//!
//! [`CartSync`] owns the shopper's working cart. Mutations apply to the local
//! lines first, are persisted to the [`LocalCartStore`] and then queued in the
//! [`Outbox`] as remote writes; they never wait on the network and never fail
//! because the remote store is down.
//!
//! Reads from the remote store follow one rule everywhere (mount, refresh,
//! login, logout): a non-empty remote cart replaces the local lines, an empty
//! one leaves them in place. Guest and customer carts are never merged.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use shopfront_core::{
    CartError, CartIdentity, CartItem, CartLines, CustomerId, FoldedRow, LineKey, Price,
    ProductId, QuantityChange, SessionId, VariantSelection,
};

use crate::error::Result;
use crate::local::LocalCartStore;
use crate::outbox::{FlushReport, IntentOp, Outbox};
use crate::remote::RemoteCartStore;

/// What a remote read did to the local cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The remote cart was non-empty and replaced the local lines.
    Replaced,
    /// The remote cart was empty; local lines were kept and queued for upload.
    RemoteEmpty,
    /// Writes for this cart are still queued, so the remote copy is behind; local lines were kept.
    PendingWrites,
    /// The remote cart could not be read; local lines were kept.
    RemoteUnavailable,
}

/// The shopper's cart, kept in step with the backend.
pub struct CartSync<L: LocalCartStore, R: RemoteCartStore> {
    local: Arc<L>,
    remote: Arc<R>,
    outbox: Outbox<L>,
    session_id: SessionId,
    identity: CartIdentity,
    lines: CartLines,
}

impl<L: LocalCartStore, R: RemoteCartStore> CartSync<L, R> {
    /// Start a cart session.
    ///
    /// Recovers (or generates) the anonymous session ID and restores the local
    /// cart. With a `customer`, the customer's remote cart is resolved first;
    /// if it is empty the guest's remote cart is tried and, when non-empty,
    /// carried over to the customer.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Local` if the session ID or the outbox cannot be
    /// read or written. Remote failures do not fail the mount.
    #[instrument(skip(local, remote))]
    pub async fn mount(
        local: Arc<L>,
        remote: Arc<R>,
        customer: Option<CustomerId>,
    ) -> Result<Self> {
        let session_id = if let Some(id) = local.load_session_id()? {
            id
        } else {
            let id = SessionId::generate();
            local.save_session_id(id)?;
            info!(session_id = %id, "Generated anonymous session");
            id
        };
        let anonymous = CartIdentity::Anonymous(session_id);
        let identity = customer.map_or(anonymous, CartIdentity::Authenticated);

        let outbox = Outbox::open(Arc::clone(&local))?;

        let mut sync = Self {
            local,
            remote,
            outbox,
            session_id,
            identity,
            lines: CartLines::new(),
        };

        let restored = sync.load_local(&identity).or_else(|| {
            identity
                .is_authenticated()
                .then(|| sync.load_local(&anonymous))
                .flatten()
        });
        sync.lines = restored.unwrap_or_default();
        debug!(lines = sync.lines.len(), "Restored local cart");

        sync.flush().await;
        let outcome = sync.resolve_remote().await;
        if outcome == RefreshOutcome::RemoteEmpty && identity.is_authenticated() {
            sync.adopt_guest_remote(anonymous).await;
        }
        sync.settle(outcome);

        info!(identity = %sync.identity, items = sync.cart_count(), "Cart mounted");
        Ok(sync)
    }

    /// The identity currently keying the cart.
    #[must_use]
    pub const fn identity(&self) -> CartIdentity {
        self.identity
    }

    /// The anonymous session ID of this shopper.
    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Current cart lines.
    #[must_use]
    pub const fn lines(&self) -> &CartLines {
        &self.lines
    }

    /// Current cart lines as a slice.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        self.lines.items()
    }

    /// Total units in the cart.
    #[must_use]
    pub fn cart_count(&self) -> u64 {
        self.lines.count()
    }

    /// Sum of line totals, or `None` for an empty cart.
    #[must_use]
    pub fn subtotal(&self) -> Option<Price> {
        self.lines.subtotal()
    }

    /// The outbox, for spawning an [`OutboxWorker`](crate::OutboxWorker).
    #[must_use]
    pub const fn outbox(&self) -> &Outbox<L> {
        &self.outbox
    }

    /// Remote writes not yet acknowledged.
    #[must_use]
    pub fn pending_writes(&self) -> usize {
        self.outbox.len()
    }

    /// Add an item, merging it into a matching line.
    ///
    /// Returns the resulting line.
    #[instrument(skip(self, item), fields(identity = %self.identity, product_id = %item.product_id, quantity = item.quantity))]
    pub fn add_item(&mut self, item: CartItem) -> CartItem {
        let line = self.lines.add(item);
        self.persist_local();
        self.enqueue(IntentOp::UpsertLine { line: line.clone() });
        debug!(line_key = %line.line_key, quantity = line.quantity, "Added to cart");
        line
    }

    /// Remove every line for the product and variant set.
    ///
    /// Returns the removed lines.
    #[instrument(skip(self, selection), fields(identity = %self.identity, product_id = %product_id))]
    pub fn remove_item(
        &mut self,
        product_id: ProductId,
        selection: &VariantSelection,
    ) -> Vec<CartItem> {
        let removed = self.lines.remove(product_id, selection);
        if removed.is_empty() {
            debug!("Nothing to remove");
            return removed;
        }

        self.persist_local();
        for line in &removed {
            self.enqueue(IntentOp::DeleteLine {
                line_key: line.line_key,
            });
        }
        debug!(lines = removed.len(), "Removed from cart");
        removed
    }

    /// Set the quantity of the line for the product and variant set.
    ///
    /// A quantity of zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the cart has no such line.
    #[instrument(skip(self, selection), fields(identity = %self.identity, product_id = %product_id))]
    pub fn update_quantity(
        &mut self,
        product_id: ProductId,
        selection: &VariantSelection,
        quantity: u32,
    ) -> std::result::Result<QuantityChange, CartError> {
        let change = self.lines.update_quantity(product_id, selection, quantity)?;
        self.persist_local();

        let op = match &change {
            QuantityChange::Updated(line) => IntentOp::UpsertLine { line: line.clone() },
            QuantityChange::Removed(line) => IntentOp::DeleteLine {
                line_key: line.line_key,
            },
        };
        self.enqueue(op);
        Ok(change)
    }

    /// Empty the cart locally and queue a remote bulk delete.
    #[instrument(skip(self), fields(identity = %self.identity))]
    pub fn clear_cart(&mut self) {
        self.lines.clear();
        if let Err(e) = self.local.clear_cart(&self.identity) {
            warn!(error = %e, "Failed to clear local cart");
        }
        self.enqueue(IntentOp::ClearCart);
        info!("Cart cleared");
    }

    /// Re-read the remote cart for the current identity.
    ///
    /// Queued writes are delivered first. A non-empty remote cart replaces the
    /// local lines; otherwise the local lines stay.
    #[instrument(skip(self), fields(identity = %self.identity))]
    pub async fn refresh_cart(&mut self) -> RefreshOutcome {
        self.flush().await;
        let outcome = self.resolve_remote().await;
        self.settle(outcome);
        outcome
    }

    /// Make `identity` the cart key (login, or logout back to the guest session).
    ///
    /// Writes queued for the previous identity are delivered first, then the
    /// new identity's remote cart is resolved like [`Self::refresh_cart`].
    /// The current lines are not merged into a non-empty remote cart; they
    /// survive only if the new identity's remote cart is empty or unreadable.
    /// When it is unreadable, or still behind queued writes, the new
    /// identity's own local snapshot is restored if there is one.
    #[instrument(skip(self), fields(from = %self.identity, to = %identity))]
    pub async fn switch_identity(&mut self, identity: CartIdentity) -> RefreshOutcome {
        if identity == self.identity {
            return self.refresh_cart().await;
        }

        self.flush().await;
        self.identity = identity;
        self.strip_remote_ids();

        let outcome = self.resolve_remote().await;
        if matches!(
            outcome,
            RefreshOutcome::PendingWrites | RefreshOutcome::RemoteUnavailable
        ) && let Some(saved) = self.load_local(&identity)
        {
            debug!(lines = saved.len(), "Restoring local cart of new identity");
            self.lines = saved;
        }
        self.settle(outcome);
        info!(outcome = ?outcome, items = self.cart_count(), "Switched cart identity");
        outcome
    }

    /// Log in as `customer`.
    pub async fn login(&mut self, customer: CustomerId) -> RefreshOutcome {
        self.switch_identity(CartIdentity::Authenticated(customer))
            .await
    }

    /// Log out to the guest session.
    pub async fn logout(&mut self) -> RefreshOutcome {
        self.switch_identity(CartIdentity::Anonymous(self.session_id))
            .await
    }

    /// Deliver queued remote writes now.
    pub async fn flush(&self) -> FlushReport {
        self.outbox.flush(self.remote.as_ref()).await
    }

    /// Fetch the remote cart for the current identity and apply the refresh rule.
    async fn resolve_remote(&mut self) -> RefreshOutcome {
        if self.outbox.pending_for(&self.identity) > 0 {
            debug!("Remote cart is behind queued writes, keeping local cart");
            return RefreshOutcome::PendingWrites;
        }

        match self.remote.fetch_cart(&self.identity).await {
            Ok(rows) if rows.is_empty() => RefreshOutcome::RemoteEmpty,
            Ok(rows) => {
                let (remote, folded) = CartLines::fold(rows);
                debug!(lines = remote.len(), "Replacing local cart with remote cart");
                self.lines = remote;
                self.repair_folded_rows(&folded);
                RefreshOutcome::Replaced
            }
            Err(e) => {
                warn!(error = %e, identity = %self.identity, "Failed to fetch remote cart, keeping local cart");
                RefreshOutcome::RemoteUnavailable
            }
        }
    }

    /// Take over the guest's remote cart when the customer's is empty.
    async fn adopt_guest_remote(&mut self, anonymous: CartIdentity) {
        if self.outbox.pending_for(&anonymous) > 0 {
            return;
        }
        match self.remote.fetch_cart(&anonymous).await {
            Ok(rows) if !rows.is_empty() => {
                self.lines = CartLines::from(rows);
                info!(lines = self.lines.len(), "Carrying guest cart over to customer");
                self.strip_remote_ids();
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to fetch guest remote cart"),
        }
    }

    /// Rewrite remote rows that were folded into another line on read.
    ///
    /// Each absorbed row is deleted and the line it went into is upserted with
    /// the combined quantity, so later edits to that line cover every unit.
    fn repair_folded_rows(&self, folded: &[FoldedRow]) {
        if folded.is_empty() {
            return;
        }
        info!(rows = folded.len(), "Folding duplicate remote rows");
        for row in folded {
            self.enqueue(IntentOp::DeleteLine {
                line_key: row.line_key,
            });
        }
        let mut merged: Vec<LineKey> = Vec::new();
        for row in folded {
            if !merged.contains(&row.into) {
                merged.push(row.into);
            }
        }
        for line_key in merged {
            if let Some(line) = self.lines.get(line_key) {
                self.enqueue(IntentOp::UpsertLine { line: line.clone() });
            }
        }
    }

    /// Persist the lines after a remote read and upload them if the remote cart was empty.
    fn settle(&mut self, outcome: RefreshOutcome) {
        self.persist_local();
        if outcome == RefreshOutcome::RemoteEmpty && !self.lines.is_empty() {
            debug!(lines = self.lines.len(), "Uploading local cart to empty remote cart");
            let lines: Vec<CartItem> = self.lines.items().to_vec();
            for line in lines {
                self.enqueue(IntentOp::UpsertLine { line });
            }
        }
    }

    /// Row IDs belong to the cart they were read from.
    fn strip_remote_ids(&mut self) {
        let items = std::mem::take(&mut self.lines)
            .into_items()
            .into_iter()
            .map(|mut item| {
                item.remote_id = None;
                item
            })
            .collect::<Vec<_>>();
        self.lines = CartLines::from(items);
    }

    fn load_local(&self, identity: &CartIdentity) -> Option<CartLines> {
        match self.local.load_cart(identity) {
            Ok(lines) => lines,
            Err(e) => {
                warn!(error = %e, identity = %identity, "Failed to load local cart");
                None
            }
        }
    }

    fn persist_local(&self) {
        if let Err(e) = self.local.save_cart(&self.identity, &self.lines) {
            warn!(error = %e, identity = %self.identity, "Failed to persist local cart");
        }
    }

    fn enqueue(&self, op: IntentOp) {
        if let Err(e) = self.outbox.enqueue(self.identity, op) {
            warn!(error = %e, "Failed to persist outbox; write stays queued in memory");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::local::MemoryCartStore;
    use crate::remote::MemoryRemoteStore;
    use shopfront_core::{CurrencyCode, OptionId, VariantChoice, VariantId};

    type TestCart = CartSync<MemoryCartStore, MemoryRemoteStore>;

    fn variant(option: i32) -> VariantSelection {
        VariantSelection::new(vec![VariantChoice::new(
            VariantId::new(1),
            OptionId::new(option),
        )])
    }

    fn item(product: i32, selection: VariantSelection, quantity: u32) -> CartItem {
        CartItem::new(
            ProductId::new(product),
            selection,
            Price::from_cents(1250, CurrencyCode::USD),
            quantity,
        )
        .unwrap()
    }

    fn stores() -> (Arc<MemoryCartStore>, Arc<MemoryRemoteStore>) {
        (
            Arc::new(MemoryCartStore::new()),
            Arc::new(MemoryRemoteStore::new()),
        )
    }

    async fn guest(local: &Arc<MemoryCartStore>, remote: &Arc<MemoryRemoteStore>) -> TestCart {
        CartSync::mount(Arc::clone(local), Arc::clone(remote), None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_mount_generates_and_recovers_session() {
        let (local, remote) = stores();
        let first = guest(&local, &remote).await;
        let second = guest(&local, &remote).await;

        assert_eq!(first.session_id(), second.session_id());
        assert_eq!(
            second.identity(),
            CartIdentity::Anonymous(first.session_id())
        );
    }

    #[tokio::test]
    async fn test_duplicate_add_merges() {
        let (local, remote) = stores();
        let mut cart = guest(&local, &remote).await;

        cart.add_item(item(1, variant(1), 2));
        cart.add_item(item(1, variant(1), 1));

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 3);
    }

    #[tokio::test]
    async fn test_different_variants_are_separate_lines() {
        let (local, remote) = stores();
        let mut cart = guest(&local, &remote).await;

        cart.add_item(item(1, variant(1), 1));
        cart.add_item(item(1, variant(2), 1));

        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.cart_count(), 2);
    }

    #[tokio::test]
    async fn test_mutations_persist_locally_before_remote() {
        let (local, remote) = stores();
        let mut cart = guest(&local, &remote).await;

        cart.add_item(item(1, variant(1), 2));

        let saved = local.load_cart(&cart.identity()).unwrap().unwrap();
        assert_eq!(saved.count(), 2);
        assert!(remote.snapshot(&cart.identity()).is_empty());
        assert_eq!(cart.pending_writes(), 1);

        cart.flush().await;
        assert_eq!(remote.snapshot(&cart.identity()).count(), 2);
    }

    #[tokio::test]
    async fn test_remote_failure_keeps_local_state() {
        let (local, remote) = stores();
        let mut cart = guest(&local, &remote).await;
        remote.set_unavailable(true);

        cart.add_item(item(1, variant(1), 1));
        let report = cart.flush().await;

        assert!(report.failed());
        assert_eq!(cart.cart_count(), 1);
        assert_eq!(cart.pending_writes(), 1);
    }

    #[tokio::test]
    async fn test_update_quantity_and_remove_sync_remotely() {
        let (local, remote) = stores();
        let mut cart = guest(&local, &remote).await;
        cart.add_item(item(1, variant(1), 1));
        cart.add_item(item(2, VariantSelection::none(), 1));

        let change = cart
            .update_quantity(ProductId::new(1), &variant(1), 5)
            .unwrap();
        assert!(matches!(change, QuantityChange::Updated(ref line) if line.quantity == 5));
        cart.remove_item(ProductId::new(2), &VariantSelection::none());
        cart.flush().await;

        let remote_cart = remote.snapshot(&cart.identity());
        assert_eq!(remote_cart.len(), 1);
        assert_eq!(remote_cart.count(), 5);
    }

    #[tokio::test]
    async fn test_update_quantity_zero_removes() {
        let (local, remote) = stores();
        let mut cart = guest(&local, &remote).await;
        cart.add_item(item(1, variant(1), 3));

        let change = cart
            .update_quantity(ProductId::new(1), &variant(1), 0)
            .unwrap();

        assert!(matches!(change, QuantityChange::Removed(_)));
        assert!(cart.items().is_empty());
    }

    #[tokio::test]
    async fn test_update_quantity_missing_line() {
        let (local, remote) = stores();
        let mut cart = guest(&local, &remote).await;

        let result = cart.update_quantity(ProductId::new(9), &variant(1), 2);
        assert_eq!(result, Err(CartError::LineNotFound(ProductId::new(9))));
        assert_eq!(cart.pending_writes(), 0);
    }

    #[tokio::test]
    async fn test_cart_count_tracks_every_operation() {
        let (local, remote) = stores();
        let mut cart = guest(&local, &remote).await;

        cart.add_item(item(1, variant(1), 2));
        cart.add_item(item(2, variant(1), 4));
        cart.add_item(item(1, variant(1), 1));
        cart.update_quantity(ProductId::new(2), &variant(1), 1)
            .unwrap();
        cart.add_item(item(3, VariantSelection::none(), 6));
        cart.remove_item(ProductId::new(3), &VariantSelection::none());

        let sum: u64 = cart.items().iter().map(|i| u64::from(i.quantity)).sum();
        assert_eq!(cart.cart_count(), sum);
        assert_eq!(cart.cart_count(), 4);
    }

    #[tokio::test]
    async fn test_clear_cart_empties_local_storage() {
        let (local, remote) = stores();
        let mut cart = guest(&local, &remote).await;
        cart.add_item(item(1, variant(1), 2));
        cart.flush().await;

        cart.clear_cart();

        assert!(cart.items().is_empty());
        assert!(local.load_cart(&cart.identity()).unwrap().is_none());

        cart.flush().await;
        assert!(remote.snapshot(&cart.identity()).is_empty());
    }

    #[tokio::test]
    async fn test_refresh_replaces_with_non_empty_remote() {
        let (local, remote) = stores();
        let mut cart = guest(&local, &remote).await;
        cart.add_item(item(1, variant(1), 1));
        cart.flush().await;

        let other_device = CartLines::from(vec![item(5, VariantSelection::none(), 7)]);
        remote.seed(&cart.identity(), &other_device);

        assert_eq!(cart.refresh_cart().await, RefreshOutcome::Replaced);
        assert_eq!(cart.cart_count(), 7);
        assert_eq!(
            local.load_cart(&cart.identity()).unwrap().unwrap().count(),
            7
        );
    }

    #[tokio::test]
    async fn test_refresh_keeps_local_when_remote_empty() {
        let (local, remote) = stores();
        let mut cart = guest(&local, &remote).await;
        cart.add_item(item(1, variant(1), 2));
        cart.flush().await;
        remote.clear_cart(&cart.identity()).await.unwrap();

        assert_eq!(cart.refresh_cart().await, RefreshOutcome::RemoteEmpty);
        assert_eq!(cart.cart_count(), 2);

        // The kept lines are uploaded again
        cart.flush().await;
        assert_eq!(remote.snapshot(&cart.identity()).count(), 2);
    }

    #[tokio::test]
    async fn test_refresh_with_pending_writes_keeps_local() {
        let (local, remote) = stores();
        let mut cart = guest(&local, &remote).await;
        remote.seed(
            &cart.identity(),
            &CartLines::from(vec![item(8, VariantSelection::none(), 1)]),
        );
        remote.set_unavailable(true);
        cart.add_item(item(1, variant(1), 2));

        assert_eq!(cart.refresh_cart().await, RefreshOutcome::PendingWrites);
        assert_eq!(cart.cart_count(), 2);
    }

    #[tokio::test]
    async fn test_login_with_non_empty_remote_replaces_local() {
        let (local, remote) = stores();
        let mut cart = guest(&local, &remote).await;
        cart.add_item(item(1, variant(1), 2));

        let customer = CartIdentity::Authenticated(CustomerId::new(10));
        remote.seed(
            &customer,
            &CartLines::from(vec![item(4, VariantSelection::none(), 1)]),
        );

        let outcome = cart.switch_identity(customer).await;

        assert_eq!(outcome, RefreshOutcome::Replaced);
        assert_eq!(cart.identity(), customer);
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].product_id, ProductId::new(4));
    }

    #[tokio::test]
    async fn test_login_with_empty_remote_keeps_local() {
        let (local, remote) = stores();
        let mut cart = guest(&local, &remote).await;
        cart.add_item(item(1, variant(1), 3));

        let outcome = cart.login(CustomerId::new(11)).await;

        assert_eq!(outcome, RefreshOutcome::RemoteEmpty);
        assert_eq!(cart.cart_count(), 3);

        cart.flush().await;
        let customer = CartIdentity::Authenticated(CustomerId::new(11));
        assert_eq!(remote.snapshot(&customer).count(), 3);
        assert!(local.has_cart(&customer));
    }

    #[tokio::test]
    async fn test_login_with_unreachable_remote_keeps_local() {
        let (local, remote) = stores();
        let mut cart = guest(&local, &remote).await;
        cart.add_item(item(1, variant(1), 1));
        cart.flush().await;
        remote.set_unavailable(true);

        let outcome = cart.login(CustomerId::new(12)).await;

        assert_eq!(outcome, RefreshOutcome::RemoteUnavailable);
        assert_eq!(cart.cart_count(), 1);
    }

    #[tokio::test]
    async fn test_logout_with_empty_guest_remote_keeps_cart() {
        let (local, remote) = stores();
        let customer = CustomerId::new(13);
        let mut cart = CartSync::mount(Arc::clone(&local), Arc::clone(&remote), Some(customer))
            .await
            .unwrap();
        cart.add_item(item(4, VariantSelection::none(), 3));
        cart.flush().await;

        let outcome = cart.logout().await;

        let guest = CartIdentity::Anonymous(cart.session_id());
        assert_eq!(outcome, RefreshOutcome::RemoteEmpty);
        assert_eq!(cart.identity(), guest);
        assert_eq!(cart.cart_count(), 3);

        cart.flush().await;
        assert_eq!(remote.snapshot(&guest).count(), 3);
    }

    #[tokio::test]
    async fn test_logout_with_guest_remote_replaces_cart() {
        let (local, remote) = stores();
        let session = guest(&local, &remote).await.session_id();
        remote.seed(
            &CartIdentity::Anonymous(session),
            &CartLines::from(vec![item(2, VariantSelection::none(), 1)]),
        );
        let customer = CartIdentity::Authenticated(CustomerId::new(15));
        remote.seed(
            &customer,
            &CartLines::from(vec![item(4, VariantSelection::none(), 2)]),
        );
        let mut cart = CartSync::mount(
            Arc::clone(&local),
            Arc::clone(&remote),
            Some(CustomerId::new(15)),
        )
        .await
        .unwrap();
        assert_eq!(cart.cart_count(), 2);

        assert_eq!(cart.logout().await, RefreshOutcome::Replaced);
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].product_id, ProductId::new(2));
    }

    #[tokio::test]
    async fn test_login_with_queued_customer_writes_restores_customer_cart() {
        let (local, remote) = stores();
        let customer = CustomerId::new(16);
        let mut cart = guest(&local, &remote).await;
        cart.add_item(item(1, variant(1), 1));
        cart.flush().await;

        cart.login(customer).await;
        remote.set_unavailable(true);
        cart.add_item(item(2, VariantSelection::none(), 4));
        assert_eq!(cart.cart_count(), 5);

        assert_eq!(cart.logout().await, RefreshOutcome::RemoteUnavailable);
        assert_eq!(cart.cart_count(), 1);
        cart.add_item(item(3, VariantSelection::none(), 1));

        let outcome = cart.login(customer).await;

        assert_eq!(outcome, RefreshOutcome::PendingWrites);
        assert_eq!(cart.cart_count(), 5);
        assert!(cart.items().iter().all(|line| line.product_id != ProductId::new(3)));

        remote.set_unavailable(false);
        cart.flush().await;
        assert_eq!(
            remote.snapshot(&CartIdentity::Authenticated(customer)).count(),
            5
        );
    }

    #[tokio::test]
    async fn test_duplicate_remote_rows_are_folded_and_repaired() {
        let (local, remote) = stores();
        let customer = CustomerId::new(17);
        let identity = CartIdentity::Authenticated(customer);
        let mut phone = CartSync::mount(Arc::clone(&local), Arc::clone(&remote), Some(customer))
            .await
            .unwrap();
        // Another device added the same line under its own key
        remote
            .upsert_line(&identity, &item(1, variant(1), 1))
            .await
            .unwrap();
        phone.add_item(item(1, variant(1), 2));
        phone.flush().await;
        assert_eq!(remote.rows(&identity).len(), 2);

        assert_eq!(phone.refresh_cart().await, RefreshOutcome::Replaced);
        assert_eq!(phone.items().len(), 1);
        assert_eq!(phone.cart_count(), 3);

        phone.flush().await;
        let rows = remote.rows(&identity);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity, 3);

        phone.remove_item(ProductId::new(1), &variant(1));
        phone.flush().await;
        assert_eq!(phone.refresh_cart().await, RefreshOutcome::RemoteEmpty);
        assert_eq!(phone.cart_count(), 0);
        assert!(remote.rows(&identity).is_empty());
    }

    #[tokio::test]
    async fn test_mount_as_customer_falls_back_to_guest_remote_cart() {
        let (local, remote) = stores();
        let session = guest(&local, &remote).await.session_id();
        remote.seed(
            &CartIdentity::Anonymous(session),
            &CartLines::from(vec![item(6, VariantSelection::none(), 2)]),
        );

        let customer = CustomerId::new(14);
        let mut cart = CartSync::mount(Arc::clone(&local), Arc::clone(&remote), Some(customer))
            .await
            .unwrap();

        assert_eq!(cart.identity(), CartIdentity::Authenticated(customer));
        assert_eq!(cart.cart_count(), 2);

        cart.flush().await;
        assert_eq!(
            remote.snapshot(&CartIdentity::Authenticated(customer)).count(),
            2
        );
    }

    #[tokio::test]
    async fn test_mount_restores_local_cart() {
        let (local, remote) = stores();
        {
            let mut cart = guest(&local, &remote).await;
            remote.set_unavailable(true);
            cart.add_item(item(1, variant(1), 2));
        }

        let cart = guest(&local, &remote).await;
        assert_eq!(cart.cart_count(), 2);
        assert_eq!(cart.pending_writes(), 1);
    }

    #[tokio::test]
    async fn test_example_session() {
        let (local, remote) = stores();
        let mut cart = guest(&local, &remote).await;

        cart.add_item(item(1, variant(1), 2));
        assert_eq!(cart.cart_count(), 2);
        cart.add_item(item(1, variant(1), 1));
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.cart_count(), 3);

        cart.login(CustomerId::new(1)).await;
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.cart_count(), 3);

        cart.remove_item(ProductId::new(1), &variant(1));
        assert!(cart.items().is_empty());
    }
}
