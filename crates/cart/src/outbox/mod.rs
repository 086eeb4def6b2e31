//! Durable outbox of remote cart writes.
//!
//! Every local cart mutation enqueues a [`CartIntent`] describing the remote
//! write it implies. Intents are persisted through the [`LocalCartStore`]
//! before the mutation returns, then delivered by [`Outbox::flush`] (called by
//! the [`OutboxWorker`] or directly) strictly in enqueue order. An intent
//! leaves the outbox only once the remote store has acknowledged it.
//!
//! # Lifecycle
//!
//! ```text
//! enqueue -> pending -> delivered (removed)
//!               |
//!               +-> failed attempt (attempts += 1, stays at the head)
//! ```
//!
//! Remote writes are idempotent (keyed by [`LineKey`], absolute quantities), so
//! an intent delivered twice after a crash between delivery and removal is harmless.

mod backoff;
mod worker;

pub use backoff::Backoff;
pub use worker::OutboxWorker;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::sync::futures::Notified;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use shopfront_core::{CartIdentity, CartItem, LineKey};

use crate::local::{LocalCartStore, LocalStoreError};
use crate::remote::{RemoteCartStore, RemoteError};

/// The remote write an intent stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum IntentOp {
    /// Write the line with its current quantity.
    UpsertLine {
        /// Line snapshot at enqueue time.
        line: CartItem,
    },
    /// Delete one line.
    DeleteLine {
        /// Key of the line to delete.
        line_key: LineKey,
    },
    /// Delete every line of the cart.
    ClearCart,
}

impl IntentOp {
    const fn name(&self) -> &'static str {
        match self {
            Self::UpsertLine { .. } => "upsert_line",
            Self::DeleteLine { .. } => "delete_line",
            Self::ClearCart => "clear_cart",
        }
    }
}

/// A pending remote write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartIntent {
    /// Unique intent ID.
    pub id: Uuid,
    /// Cart the write applies to.
    pub identity: CartIdentity,
    /// What to write.
    pub op: IntentOp,
    /// Failed delivery attempts so far.
    pub attempts: u32,
    /// Error from the most recent failed attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// When the intent was enqueued.
    pub enqueued_at: DateTime<Utc>,
}

impl CartIntent {
    fn new(identity: CartIdentity, op: IntentOp) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity,
            op,
            attempts: 0,
            last_error: None,
            enqueued_at: Utc::now(),
        }
    }

    /// Whether a later intent makes this one redundant.
    fn superseded_by(&self, later: &Self) -> bool {
        if self.identity != later.identity {
            return false;
        }
        match (&self.op, &later.op) {
            // Clearing the cart makes every earlier write to it irrelevant
            (_, IntentOp::ClearCart) => true,
            // Upserts carry absolute quantities; the latest one wins
            (IntentOp::UpsertLine { line: earlier }, IntentOp::UpsertLine { line: latest }) => {
                earlier.line_key == latest.line_key
            }
            _ => false,
        }
    }
}

/// Outcome of one [`Outbox::flush`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Intents acknowledged by the remote store during this pass.
    pub delivered: usize,
    /// Intents still waiting.
    pub remaining: usize,
    /// Error that stopped the pass, if any.
    pub failure: Option<String>,
    /// Wait the remote store asked for before the next attempt.
    pub retry_after: Option<Duration>,
}

impl FlushReport {
    /// Whether the pass stopped on a failed delivery.
    #[must_use]
    pub const fn failed(&self) -> bool {
        self.failure.is_some()
    }
}

/// Shared, persisted queue of pending remote writes.
///
/// Cheaply cloneable; the engine and the worker hold clones of the same queue.
pub struct Outbox<L: LocalCartStore> {
    inner: Arc<OutboxInner<L>>,
}

struct OutboxInner<L> {
    queue: Mutex<VecDeque<CartIntent>>,
    store: Arc<L>,
    notify: Notify,
    // Serializes deliveries so two flushes never reorder intents
    flush_lock: tokio::sync::Mutex<()>,
}

impl<L: LocalCartStore> Clone for Outbox<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: LocalCartStore> Outbox<L> {
    /// Open the outbox, restoring intents persisted by a previous run.
    ///
    /// # Errors
    ///
    /// Returns `LocalStoreError` if the persisted outbox cannot be read.
    pub fn open(store: Arc<L>) -> Result<Self, LocalStoreError> {
        let restored = store.load_outbox()?;
        if !restored.is_empty() {
            debug!(pending = restored.len(), "Restored outbox intents");
        }

        Ok(Self {
            inner: Arc::new(OutboxInner {
                queue: Mutex::new(restored.into()),
                store,
                notify: Notify::new(),
                flush_lock: tokio::sync::Mutex::new(()),
            }),
        })
    }

    /// Queue a remote write for `identity` and wake the worker.
    ///
    /// Earlier intents made redundant by this one are dropped.
    ///
    /// # Errors
    ///
    /// Returns `LocalStoreError` if the outbox cannot be persisted. The intent
    /// stays queued in memory.
    pub fn enqueue(&self, identity: CartIdentity, op: IntentOp) -> Result<Uuid, LocalStoreError> {
        let intent = CartIntent::new(identity, op);
        let id = intent.id;
        debug!(intent_id = %id, op = intent.op.name(), identity = %identity, "Enqueued cart intent");

        let result = {
            let mut queue = self.lock();
            queue.retain(|pending| !pending.superseded_by(&intent));
            queue.push_back(intent);
            self.persist(&queue)
        };

        self.inner.notify.notify_one();
        result.map(|()| id)
    }

    /// Number of intents waiting for delivery.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is waiting for delivery.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of intents waiting for delivery to `identity`'s cart.
    #[must_use]
    pub fn pending_for(&self, identity: &CartIdentity) -> usize {
        self.lock()
            .iter()
            .filter(|intent| &intent.identity == identity)
            .count()
    }

    /// Copy of the pending intents in delivery order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<CartIntent> {
        self.lock().iter().cloned().collect()
    }

    /// Resolves when an intent is enqueued.
    pub fn notified(&self) -> Notified<'_> {
        self.inner.notify.notified()
    }

    /// Deliver pending intents in order until the queue is empty or a delivery fails.
    ///
    /// A failed intent stays at the head of the queue with its attempt count
    /// incremented, so later intents never overtake it.
    #[instrument(skip(self, remote))]
    pub async fn flush<R: RemoteCartStore>(&self, remote: &R) -> FlushReport {
        let _guard = self.inner.flush_lock.lock().await;
        let mut report = FlushReport::default();

        loop {
            let Some(intent) = self.lock().front().cloned() else {
                break;
            };

            match deliver(remote, &intent).await {
                Ok(()) => {
                    let mut queue = self.lock();
                    queue.retain(|pending| pending.id != intent.id);
                    if let Err(e) = self.persist(&queue) {
                        warn!(error = %e, "Failed to persist outbox after delivery");
                    }
                    report.delivered += 1;
                }
                Err(e) => {
                    let message = e.to_string();
                    report.retry_after = e.retry_after();
                    let mut queue = self.lock();
                    if let Some(pending) = queue.iter_mut().find(|p| p.id == intent.id) {
                        pending.attempts = pending.attempts.saturating_add(1);
                        pending.last_error = Some(message.clone());
                    }
                    if let Err(e) = self.persist(&queue) {
                        warn!(error = %e, "Failed to persist outbox after failed delivery");
                    }
                    warn!(
                        intent_id = %intent.id,
                        op = intent.op.name(),
                        identity = %intent.identity,
                        attempt = intent.attempts + 1,
                        error = %message,
                        "Cart intent delivery failed"
                    );
                    report.failure = Some(message);
                    break;
                }
            }
        }

        report.remaining = self.len();
        if report.delivered > 0 {
            debug!(delivered = report.delivered, remaining = report.remaining, "Flushed outbox");
        }
        report
    }

    fn persist(&self, queue: &VecDeque<CartIntent>) -> Result<(), LocalStoreError> {
        let intents: Vec<CartIntent> = queue.iter().cloned().collect();
        self.inner.store.save_outbox(&intents)
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<CartIntent>> {
        self.inner
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Perform the remote call for one intent.
async fn deliver<R: RemoteCartStore>(remote: &R, intent: &CartIntent) -> Result<(), RemoteError> {
    match &intent.op {
        IntentOp::UpsertLine { line } => remote.upsert_line(&intent.identity, line).await,
        IntentOp::DeleteLine { line_key } => remote.delete_line(&intent.identity, *line_key).await,
        IntentOp::ClearCart => remote.clear_cart(&intent.identity).await,
    }
}
