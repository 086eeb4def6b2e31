//! Exponential retry delays for outbox delivery.
//!
//! The schedule is `backon`'s exponential backoff. Attempt counts are persisted
//! with each intent, so the delay for a given attempt is read off a fresh
//! schedule rather than kept in a live retry loop.

use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};

use crate::config::OutboxConfig;

/// Past this many doublings every delay is already at the ceiling.
const MAX_STEPS: u32 = 63;

/// Exponential backoff with a ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    /// Create a backoff starting at `base` and never exceeding `max`.
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
        }
    }

    /// Backoff described by an outbox configuration.
    #[must_use]
    pub fn from_config(config: &OutboxConfig) -> Self {
        Self::new(config.base_delay, config.max_delay)
    }

    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt - 1)`, capped.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        self.nth(self.builder(), attempt)
    }

    /// [`Self::delay`] plus a random jitter of up to the same amount.
    #[must_use]
    pub fn jittered(&self, attempt: u32) -> Duration {
        self.nth(self.builder().with_jitter(), attempt)
    }

    fn builder(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.base)
            .with_max_delay(self.max)
            .with_factor(2.0)
            .without_max_times()
    }

    fn nth(&self, builder: ExponentialBuilder, attempt: u32) -> Duration {
        let step = attempt.saturating_sub(1).min(MAX_STEPS);
        builder
            .build()
            .nth(step as usize)
            .unwrap_or(self.max)
    }
}
