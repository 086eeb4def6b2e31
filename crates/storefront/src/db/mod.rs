//! Cart persistence for the storefront API.
//!
//! # Database: `storefront` schema
//!
//! ## Tables
//!
//! - `cart` - One row per cart identity (`session:<uuid>` / `customer:<id>`)
//! - `cart_item` - Cart lines, unique per `(cart_id, line_key)`
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p shopfront-cli -- migrate
//! ```

mod carts;
mod memory;

pub use carts::PgCartStore;
pub use memory::MemoryCartBackend;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tracing::debug;

use shopfront_core::{CartIdentity, CartItem, LineKey};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., quantity out of range).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Storage a [`CartRepository`] reads and writes.
pub enum CartBackend {
    /// `PostgreSQL` tables in the `storefront` schema.
    Postgres(PgCartStore),
    /// Process memory.
    Memory(MemoryCartBackend),
}

/// Cart repository with a short-lived read cache.
///
/// Cheaply cloneable. Every write invalidates the cached copy of the cart it
/// touched, so a read after a write always sees the write. A read that raced
/// a write is dropped from the cache again instead of outliving it.
#[derive(Clone)]
pub struct CartRepository {
    inner: Arc<CartRepositoryInner>,
}

struct CartRepositoryInner {
    backend: CartBackend,
    cache: Cache<String, Vec<CartItem>>,
    /// Bumped after every write, before its invalidation.
    writes: AtomicU64,
}

impl CartRepository {
    /// Create a repository over `backend`, caching reads for `cache_ttl`.
    #[must_use]
    pub fn new(backend: CartBackend, cache_ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(cache_ttl)
            .build();

        Self {
            inner: Arc::new(CartRepositoryInner {
                backend,
                cache,
                writes: AtomicU64::new(0),
            }),
        }
    }

    /// Repository backed by `PostgreSQL`.
    #[must_use]
    pub fn postgres(pool: PgPool, cache_ttl: Duration) -> Self {
        Self::new(CartBackend::Postgres(PgCartStore::new(pool)), cache_ttl)
    }

    /// Repository backed by process memory.
    #[must_use]
    pub fn in_memory(cache_ttl: Duration) -> Self {
        Self::new(CartBackend::Memory(MemoryCartBackend::new()), cache_ttl)
    }

    /// Fetch every stored row of a cart, oldest first. Unknown carts are empty.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the rows cannot be read.
    pub async fn fetch(&self, identity: &CartIdentity) -> Result<Vec<CartItem>, RepositoryError> {
        let key = identity.storage_key();
        if let Some(rows) = self.inner.cache.get(&key).await {
            debug!(identity = %key, "Cache hit for cart");
            return Ok(rows);
        }

        let epoch = self.write_epoch();
        let rows = match &self.inner.backend {
            CartBackend::Postgres(store) => store.fetch(&key).await?,
            CartBackend::Memory(store) => store.fetch(&key),
        };

        self.cache_read(key, rows.clone(), epoch).await;
        Ok(rows)
    }

    /// Insert a line or overwrite the quantity of the line with the same key.
    ///
    /// Creates the cart on its first line. Returns the stored line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the write fails.
    pub async fn upsert_line(
        &self,
        identity: &CartIdentity,
        line: &CartItem,
    ) -> Result<CartItem, RepositoryError> {
        let key = identity.storage_key();
        let stored = match &self.inner.backend {
            CartBackend::Postgres(store) => store.upsert_line(&key, line).await?,
            CartBackend::Memory(store) => store.upsert_line(&key, line),
        };
        self.invalidate(&key).await;
        Ok(stored)
    }

    /// Delete one line. Returns whether a line was deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the delete fails.
    pub async fn delete_line(
        &self,
        identity: &CartIdentity,
        line_key: LineKey,
    ) -> Result<bool, RepositoryError> {
        let key = identity.storage_key();
        let deleted = match &self.inner.backend {
            CartBackend::Postgres(store) => store.delete_line(&key, line_key).await?,
            CartBackend::Memory(store) => store.delete_line(&key, line_key),
        };
        self.invalidate(&key).await;
        Ok(deleted)
    }

    /// Delete a cart and all its lines. Returns the number of lines removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the delete fails.
    pub async fn clear(&self, identity: &CartIdentity) -> Result<u64, RepositoryError> {
        let key = identity.storage_key();
        let removed = match &self.inner.backend {
            CartBackend::Postgres(store) => store.clear(&key).await?,
            CartBackend::Memory(store) => store.clear(&key),
        };
        self.invalidate(&key).await;
        Ok(removed)
    }

    /// Check that the backing store is reachable.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the database does not answer.
    pub async fn ping(&self) -> Result<(), RepositoryError> {
        match &self.inner.backend {
            CartBackend::Postgres(store) => store.ping().await,
            CartBackend::Memory(_) => Ok(()),
        }
    }

    fn write_epoch(&self) -> u64 {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// Cache rows read while the write counter stood at `epoch`.
    ///
    /// Any write since then may have been invalidated before this insert, so
    /// the entry is evicted again rather than served until its TTL.
    async fn cache_read(&self, key: String, rows: Vec<CartItem>, epoch: u64) {
        self.inner.cache.insert(key.clone(), rows).await;
        if self.write_epoch() != epoch {
            debug!(identity = %key, "Cart written during read, not caching");
            self.inner.cache.invalidate(&key).await;
        }
    }

    async fn invalidate(&self, key: &str) {
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.cache.invalidate(key).await;
    }
}
