//! Integration tests for cart identity transitions.
//!
//! Covers mount, login and logout: which cart wins, what is kept locally and
//! what is queued for the remote store.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use shopfront_cart::{
    CartSync, LocalCartStore, MemoryCartStore, MemoryRemoteStore, RefreshOutcome,
};
use shopfront_core::{CartIdentity, CartLines, CustomerId, ProductId, SessionId};
use shopfront_integration_tests::{item, variants};

type Cart = CartSync<MemoryCartStore, MemoryRemoteStore>;

const CUSTOMER: CustomerId = CustomerId::new(1);

fn customer() -> CartIdentity {
    CartIdentity::Authenticated(CUSTOMER)
}

fn stores() -> (Arc<MemoryCartStore>, Arc<MemoryRemoteStore>) {
    (
        Arc::new(MemoryCartStore::new()),
        Arc::new(MemoryRemoteStore::new()),
    )
}

async fn mount(
    local: &Arc<MemoryCartStore>,
    remote: &Arc<MemoryRemoteStore>,
    customer: Option<CustomerId>,
) -> Cart {
    CartSync::mount(Arc::clone(local), Arc::clone(remote), customer)
        .await
        .unwrap()
}

fn remote_cart(lines: Vec<shopfront_core::CartItem>) -> CartLines {
    CartLines::from(lines)
}

// =============================================================================
// Example Scenario
// =============================================================================

#[tokio::test]
async fn test_guest_login_remove_scenario() {
    let (local, remote) = stores();
    let mut cart = mount(&local, &remote, None).await;
    assert!(matches!(cart.identity(), CartIdentity::Anonymous(_)));

    let v1 = variants(&[(1, 1)]);
    cart.add_item(item(1, v1.clone(), 1000, 2));
    assert_eq!(cart.cart_count(), 2);

    cart.add_item(item(1, v1.clone(), 1000, 1));
    assert_eq!(cart.items().len(), 1);
    assert_eq!(cart.items()[0].quantity, 3);

    let outcome = cart.login(CUSTOMER).await;
    assert_eq!(outcome, RefreshOutcome::RemoteEmpty);
    assert_eq!(cart.identity(), customer());
    assert_eq!(cart.items().len(), 1);
    assert_eq!(cart.items()[0].quantity, 3);

    cart.remove_item(ProductId::new(1), &v1);
    assert!(cart.items().is_empty());
    assert_eq!(cart.cart_count(), 0);
}

// =============================================================================
// Login Tests
// =============================================================================

#[tokio::test]
async fn test_login_with_remote_cart_replaces_local() {
    let (local, remote) = stores();
    remote.seed(
        &customer(),
        &remote_cart(vec![item(5, variants(&[]), 2500, 4)]),
    );
    let mut cart = mount(&local, &remote, None).await;
    cart.add_item(item(1, variants(&[]), 1000, 2));

    let outcome = cart.login(CUSTOMER).await;

    assert_eq!(outcome, RefreshOutcome::Replaced);
    assert_eq!(cart.items().len(), 1);
    assert_eq!(cart.items()[0].product_id, ProductId::new(5));
    assert_eq!(cart.cart_count(), 4);
}

#[tokio::test]
async fn test_login_does_not_merge_guest_lines() {
    let (local, remote) = stores();
    remote.seed(
        &customer(),
        &remote_cart(vec![item(5, variants(&[]), 2500, 1)]),
    );
    let mut cart = mount(&local, &remote, None).await;
    cart.add_item(item(5, variants(&[]), 2500, 3));

    cart.login(CUSTOMER).await;

    // Same line on both sides: the remote quantity wins, nothing is summed.
    assert_eq!(cart.cart_count(), 1);
}

#[tokio::test]
async fn test_login_with_empty_remote_keeps_local_and_uploads_it() {
    let (local, remote) = stores();
    let mut cart = mount(&local, &remote, None).await;
    cart.add_item(item(1, variants(&[]), 1000, 2));

    cart.login(CUSTOMER).await;
    let report = cart.flush().await;

    assert!(!report.failed());
    assert_eq!(cart.cart_count(), 2);
    assert_eq!(remote.snapshot(&customer()).count(), 2);
    assert!(local.has_cart(&customer()));
}

#[tokio::test]
async fn test_login_while_remote_down_keeps_local() {
    let (local, remote) = stores();
    let mut cart = mount(&local, &remote, None).await;
    cart.add_item(item(1, variants(&[]), 1000, 2));
    remote.set_unavailable(true);

    let outcome = cart.login(CUSTOMER).await;

    assert_eq!(outcome, RefreshOutcome::RemoteUnavailable);
    assert_eq!(cart.identity(), customer());
    assert_eq!(cart.cart_count(), 2);
}

#[tokio::test]
async fn test_login_drops_remote_ids_from_carried_lines() {
    let (local, remote) = stores();
    let mut cart = mount(&local, &remote, None).await;
    cart.add_item(item(1, variants(&[]), 1000, 2));
    cart.flush().await;
    cart.refresh_cart().await;
    assert!(cart.items()[0].remote_id.is_some());

    cart.login(CUSTOMER).await;

    assert!(cart.items()[0].remote_id.is_none());
}

// =============================================================================
// Logout Tests
// =============================================================================

#[tokio::test]
async fn test_logout_returns_to_guest_cart() {
    let (local, remote) = stores();
    let mut cart = mount(&local, &remote, None).await;
    let guest = cart.identity();
    cart.add_item(item(1, variants(&[]), 1000, 1));

    remote.seed(
        &customer(),
        &remote_cart(vec![item(5, variants(&[]), 2500, 4)]),
    );
    cart.login(CUSTOMER).await;
    assert_eq!(cart.cart_count(), 4);

    cart.logout().await;

    assert_eq!(cart.identity(), guest);
    assert_eq!(cart.items().len(), 1);
    assert_eq!(cart.items()[0].product_id, ProductId::new(1));
}

#[tokio::test]
async fn test_logout_to_empty_guest_remote_keeps_lines() {
    let (local, remote) = stores();
    let mut cart = mount(&local, &remote, Some(CUSTOMER)).await;
    cart.add_item(item(9, variants(&[]), 1000, 3));
    cart.flush().await;

    let outcome = cart.logout().await;
    cart.flush().await;

    let guest = cart.identity();
    assert_eq!(outcome, RefreshOutcome::RemoteEmpty);
    assert!(matches!(guest, CartIdentity::Anonymous(_)));
    assert_eq!(cart.cart_count(), 3);
    assert_eq!(remote.snapshot(&guest).count(), 3);
    assert_eq!(remote.snapshot(&customer()).count(), 3);
}

// =============================================================================
// Mount Tests
// =============================================================================

#[tokio::test]
async fn test_mount_reuses_session_id() {
    let (local, remote) = stores();
    let first = mount(&local, &remote, None).await;
    let second = mount(&local, &remote, None).await;

    assert_eq!(first.session_id(), second.session_id());
}

#[tokio::test]
async fn test_mount_restores_local_cart() {
    let session = SessionId::generate();
    let local = Arc::new(MemoryCartStore::with_session(session));
    let remote = Arc::new(MemoryRemoteStore::new());
    remote.set_unavailable(true);

    let mut cart = mount(&local, &remote, None).await;
    cart.add_item(item(1, variants(&[]), 1000, 3));
    drop(cart);

    let cart = mount(&local, &remote, None).await;
    assert_eq!(cart.session_id(), session);
    assert_eq!(cart.cart_count(), 3);
    assert_eq!(cart.pending_writes(), 1);
}

#[tokio::test]
async fn test_mount_as_customer_prefers_customer_remote() {
    let session = SessionId::generate();
    let (_, remote) = stores();
    let local = Arc::new(MemoryCartStore::with_session(session));
    remote.seed(
        &CartIdentity::Anonymous(session),
        &remote_cart(vec![item(1, variants(&[]), 1000, 1)]),
    );
    remote.seed(
        &customer(),
        &remote_cart(vec![item(2, variants(&[]), 1000, 5)]),
    );

    let cart = mount(&local, &remote, Some(CUSTOMER)).await;

    assert_eq!(cart.identity(), customer());
    assert_eq!(cart.items()[0].product_id, ProductId::new(2));
    assert_eq!(cart.cart_count(), 5);
}

#[tokio::test]
async fn test_mount_as_customer_falls_back_to_guest_remote() {
    let session = SessionId::generate();
    let (_, remote) = stores();
    let local = Arc::new(MemoryCartStore::with_session(session));
    remote.seed(
        &CartIdentity::Anonymous(session),
        &remote_cart(vec![item(1, variants(&[]), 1000, 2)]),
    );

    let cart = mount(&local, &remote, Some(CUSTOMER)).await;
    cart.flush().await;

    assert_eq!(cart.identity(), customer());
    assert_eq!(cart.cart_count(), 2);
    assert_eq!(remote.snapshot(&customer()).count(), 2);
}

#[tokio::test]
async fn test_mount_as_customer_restores_guest_local_cart() {
    let session = SessionId::generate();
    let local = Arc::new(MemoryCartStore::with_session(session));
    let remote = Arc::new(MemoryRemoteStore::new());
    local
        .save_cart(
            &CartIdentity::Anonymous(session),
            &remote_cart(vec![item(3, variants(&[]), 1000, 1)]),
        )
        .unwrap();

    let cart = mount(&local, &remote, Some(CUSTOMER)).await;

    assert_eq!(cart.cart_count(), 1);
    assert_eq!(cart.items()[0].product_id, ProductId::new(3));
}

// =============================================================================
// Refresh Tests
// =============================================================================

#[tokio::test]
async fn test_refresh_with_empty_remote_keeps_local() {
    let (local, remote) = stores();
    let mut cart = mount(&local, &remote, None).await;
    cart.add_item(item(1, variants(&[]), 1000, 2));
    cart.flush().await;
    remote.seed(&cart.identity(), &CartLines::new());

    let outcome = cart.refresh_cart().await;

    assert_eq!(outcome, RefreshOutcome::RemoteEmpty);
    assert_eq!(cart.cart_count(), 2);
}

#[tokio::test]
async fn test_refresh_picks_up_remote_changes() {
    let (local, remote) = stores();
    let mut cart = mount(&local, &remote, None).await;
    cart.add_item(item(1, variants(&[]), 1000, 2));
    cart.flush().await;

    // Another device replaced the cart.
    remote.seed(
        &cart.identity(),
        &remote_cart(vec![item(8, variants(&[]), 300, 6)]),
    );
    let outcome = cart.refresh_cart().await;

    assert_eq!(outcome, RefreshOutcome::Replaced);
    assert_eq!(cart.items()[0].product_id, ProductId::new(8));
    assert_eq!(cart.cart_count(), 6);
}

#[tokio::test]
async fn test_refresh_does_not_overwrite_undelivered_writes() {
    let (local, remote) = stores();
    let mut cart = mount(&local, &remote, None).await;
    remote.seed(
        &cart.identity(),
        &remote_cart(vec![item(8, variants(&[]), 300, 6)]),
    );
    remote.set_unavailable(true);
    cart.add_item(item(1, variants(&[]), 1000, 2));

    let outcome = cart.refresh_cart().await;

    assert_eq!(outcome, RefreshOutcome::PendingWrites);
    assert_eq!(cart.items()[0].product_id, ProductId::new(1));
}
