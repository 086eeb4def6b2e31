//! Background delivery of outbox intents.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{Backoff, Outbox};
use crate::config::OutboxConfig;
use crate::local::LocalCartStore;
use crate::remote::RemoteCartStore;

/// Task that keeps flushing the outbox, backing off while the remote store fails.
///
/// Dropping the handle also stops the task, after the same final flush
/// [`OutboxWorker::shutdown`] performs, but nothing waits for it.
pub struct OutboxWorker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl OutboxWorker {
    /// Spawn the worker on the current Tokio runtime.
    pub fn spawn<L, R>(outbox: Outbox<L>, remote: Arc<R>, config: OutboxConfig) -> Self
    where
        L: LocalCartStore,
        R: RemoteCartStore,
    {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run(outbox, remote, config, shutdown_rx));
        Self { shutdown, handle }
    }

    /// Stop the worker after one last delivery attempt.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Outbox worker task failed");
        }
    }
}

async fn run<L, R>(
    outbox: Outbox<L>,
    remote: Arc<R>,
    config: OutboxConfig,
    mut shutdown: watch::Receiver<bool>,
) where
    L: LocalCartStore,
    R: RemoteCartStore,
{
    let backoff = Backoff::from_config(&config);
    info!(pending = outbox.len(), "Outbox worker started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let wait = if outbox.is_empty() {
            config.poll_interval
        } else {
            let report = outbox.flush(remote.as_ref()).await;
            if report.failed() {
                let attempts = outbox
                    .snapshot()
                    .first()
                    .map_or(1, |head| head.attempts.max(1));
                let delay = retry_delay(&backoff, attempts, report.retry_after);
                debug!(
                    attempts,
                    retry_after_secs = report.retry_after.map(|d| d.as_secs()),
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Backing off before next delivery"
                );
                // Retry waits out the delay even if more intents arrive
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    _ = shutdown.changed() => break,
                }
                continue;
            }
            config.poll_interval
        };

        tokio::select! {
            () = outbox.notified() => {}
            () = tokio::time::sleep(wait) => {}
            _ = shutdown.changed() => break,
        }
    }

    if !outbox.is_empty() {
        let report = outbox.flush(remote.as_ref()).await;
        debug!(
            delivered = report.delivered,
            remaining = report.remaining,
            "Final outbox flush"
        );
    }
    info!("Outbox worker stopped");
}

/// Wait before the next attempt: the backoff delay, or longer if the remote
/// store asked for it.
fn retry_delay(backoff: &Backoff, attempts: u32, retry_after: Option<Duration>) -> Duration {
    let delay = backoff.jittered(attempts);
    retry_after.map_or(delay, |wait| delay.max(wait))
}
