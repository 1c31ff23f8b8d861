//! Core types for action execution

use action_primitives::ActionTimeouts;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::strategies::RetryPolicy;

/// State of one action attempt, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Resolving,
    Validating,
    Preparing,
    Executing,
    Verifying,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Resolving => "resolving",
            Phase::Validating => "validating",
            Phase::Preparing => "preparing",
            Phase::Executing => "executing",
            Phase::Verifying => "verifying",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Executor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub timeouts: ActionTimeouts,
    pub retry: RetryPolicy,
    /// Overlays dismissed before a covered target counts as obscured.
    pub max_dismissals: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeouts: ActionTimeouts::default(),
            retry: RetryPolicy::default(),
            max_dismissals: 2,
        }
    }
}

impl ExecutorConfig {
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeouts(mut self, timeouts: ActionTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}
