//! Shopfront cart engine.
//!
//! Keeps a shopper's local cart consistent with the storefront's remote cart
//! across guest and customer identities.
//!
//! # Modules
//!
//! - [`sync`] - [`CartSync`], the reconciliation engine
//! - [`local`] - local persistence of the session ID, cart snapshots and outbox
//! - [`remote`] - the remote cart seam and its HTTP client
//! - [`outbox`] - durable queue of remote writes and its retry worker
//! - [`config`] - configuration from environment variables
//!
//! # Example
//!
//! ```rust,ignore
//! let config = CartSyncConfig::from_env()?;
//! let local = Arc::new(FileCartStore::open(&config.cart_dir)?);
//! let remote = Arc::new(HttpCartClient::from_config(&config)?);
//!
//! let mut cart = CartSync::mount(local, Arc::clone(&remote), None).await?;
//! let worker = OutboxWorker::spawn(cart.outbox().clone(), remote, config.outbox);
//!
//! cart.add_item(CartItem::new(product_id, VariantSelection::none(), price, 2)?);
//! cart.login(customer_id).await;
//!
//! worker.shutdown().await;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod local;
pub mod outbox;
pub mod remote;
pub mod sync;

pub use config::{CartSyncConfig, ConfigError, OutboxConfig};
pub use error::{Result, SyncError};
pub use local::{FileCartStore, LocalCartStore, LocalStoreError, MemoryCartStore};
pub use outbox::{Backoff, CartIntent, FlushReport, IntentOp, Outbox, OutboxWorker};
pub use remote::{HttpCartClient, MemoryRemoteStore, RemoteCartStore, RemoteError};
pub use sync::{CartSync, RefreshOutcome};
