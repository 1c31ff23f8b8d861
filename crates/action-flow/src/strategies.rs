//! Retry strategy for the action state machine

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::Duration;

use crate::types::Phase;
use action_primitives::ActionError;
use wayfinder_core_types::ErrorKind;

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt; an action runs at most `max_retries + 1` times.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self::new(0, 0, 0)
    }

    /// Delay before retry number `retry` (1-based): `base * 2^(retry-1)`, capped.
    pub fn calculate_backoff(&self, retry: u32) -> Duration {
        let multiplier = 2u64.saturating_pow(retry.saturating_sub(1));
        let total_ms = self.base_delay_ms.saturating_mul(multiplier);
        Duration::from_millis(total_ms.min(self.max_delay_ms))
    }

    /// Whether another attempt fits after `attempts` have been made.
    pub fn has_budget(&self, attempts: u32) -> bool {
        attempts <= self.max_retries
    }
}

/// Whether a failure may be retried without risking a repeated side effect.
///
/// Only transient kinds are retried. Failures before dispatch are always safe.
/// During dispatch only idempotent interactions are retried, plus stale handles
/// (a detached target guarantees no input was delivered). A failed post-condition
/// is retried only when replaying the interaction cannot double its effect.
pub fn retry_allowed(phase: Phase, error: &ActionError, idempotent: bool) -> bool {
    if !error.is_retryable() {
        return false;
    }
    match phase {
        Phase::Resolving | Phase::Validating | Phase::Preparing => true,
        Phase::Executing => idempotent || error.kind() == ErrorKind::StaleElement,
        Phase::Verifying => idempotent,
    }
}

/// Time source for backoff delays.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Records requested delays and returns immediately.
#[derive(Debug, Default, Clone)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().push(duration);
    }
}
