//! Integration tests for Shopfront.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopfront-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_properties` - Line merging, counts and clearing through the engine
//! - `identity_transitions` - Mount, login and logout against a remote cart
//! - `outbox_delivery` - Queued writes surviving outages and restarts
//! - `storefront_sync` - The engine against a live storefront over HTTP
//!
//! Everything runs in-process: the storefront is served from its in-memory
//! repository, so no database is needed.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::task::JoinHandle;
use url::Url;

use shopfront_cart::HttpCartClient;
use shopfront_core::{
    CartItem, CurrencyCode, OptionId, Price, ProductId, VariantChoice, VariantId, VariantSelection,
};
use shopfront_storefront::config::{StorageBackend, StorefrontConfig};
use shopfront_storefront::db::CartRepository;
use shopfront_storefront::{AppState, app};

/// A selection from `(variant, option)` pairs.
#[must_use]
pub fn variants(pairs: &[(i32, i32)]) -> VariantSelection {
    VariantSelection::new(
        pairs
            .iter()
            .map(|&(variant, option)| VariantChoice::new(VariantId::new(variant), OptionId::new(option)))
            .collect(),
    )
}

/// A USD line for `product` priced in cents.
///
/// # Panics
///
/// Panics if `quantity` is zero.
#[must_use]
pub fn item(product: i32, selection: VariantSelection, cents: i64, quantity: u32) -> CartItem {
    CartItem::new(
        ProductId::new(product),
        selection,
        Price::from_cents(cents, CurrencyCode::USD),
        quantity,
    )
    .expect("test items have a positive quantity")
}

/// Total units across stored rows.
#[must_use]
pub fn units(rows: &[CartItem]) -> u64 {
    rows.iter().map(|row| u64::from(row.quantity)).sum()
}

/// A storefront served on an ephemeral local port.
///
/// The server task is aborted on drop.
pub struct TestStorefront {
    addr: SocketAddr,
    server: JoinHandle<()>,
}

impl TestStorefront {
    /// Serve the storefront API with in-memory storage.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn spawn() -> Self {
        let config = StorefrontConfig {
            storage: StorageBackend::Memory,
            database_url: None,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            cart_cache_ttl: Duration::from_secs(60),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 0.0,
            sentry_traces_sample_rate: 0.0,
        };
        let state = AppState::new(config, CartRepository::in_memory(Duration::from_secs(60)));

        let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("Failed to bind test listener");
        let addr = listener
            .local_addr()
            .expect("Test listener has no local address");

        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app(state)).await;
        });

        Self { addr, server }
    }

    /// Base URL of the running API.
    ///
    /// # Panics
    ///
    /// Panics if the bound address does not form a URL.
    #[must_use]
    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}/", self.addr)).expect("Socket address is a valid URL")
    }

    /// A cart client pointed at this storefront.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn client(&self) -> HttpCartClient {
        HttpCartClient::new(self.base_url(), Duration::from_secs(5))
            .expect("Failed to build cart client")
    }
}

impl Drop for TestStorefront {
    fn drop(&mut self) {
        self.server.abort();
    }
}
