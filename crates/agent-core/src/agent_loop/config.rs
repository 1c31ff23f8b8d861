//! Configuration for the scrape, plan, execute loop.

use action_flow::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Budgets and bounds for one task run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentLoopConfig {
    /// Steps a task may take before it times out.
    /// Default: 100
    pub max_steps: u32,

    /// Actions kept from one planner response; the rest are dropped.
    /// Default: 3
    pub max_actions_per_step: u32,

    /// Consecutive steps with a failed batch before the task fails.
    /// Default: 3
    pub max_consecutive_failures: u32,

    /// Bound on a single planner call in milliseconds.
    /// Default: 60000
    pub planner_timeout_ms: u64,

    /// Retries of a failed planner call, separate from action retries.
    pub planner_retry: RetryPolicy,

    /// Bound on the initial navigation to the start URL.
    /// Default: 30000
    pub navigation_timeout_ms: u64,

    /// Consult and feed the plan cache when one is attached.
    /// Default: true
    pub use_cache: bool,

    /// Maximum text length per element in the planner-facing tree.
    /// Default: 100
    pub max_element_text_length: usize,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            max_steps: 100,
            max_actions_per_step: 3,
            max_consecutive_failures: 3,
            planner_timeout_ms: 60_000,
            planner_retry: RetryPolicy::new(2, 500, 5_000),
            navigation_timeout_ms: 30_000,
            use_cache: true,
            max_element_text_length: 100,
        }
    }
}

impl AgentLoopConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Small budgets for tests and dry runs.
    pub fn minimal() -> Self {
        Self {
            max_steps: 10,
            max_actions_per_step: 1,
            max_consecutive_failures: 2,
            planner_timeout_ms: 10_000,
            planner_retry: RetryPolicy::new(1, 100, 1_000),
            navigation_timeout_ms: 10_000,
            use_cache: false,
            max_element_text_length: 50,
        }
    }

    pub fn max_steps(mut self, steps: u32) -> Self {
        self.max_steps = steps;
        self
    }

    pub fn actions_per_step(mut self, count: u32) -> Self {
        self.max_actions_per_step = count;
        self
    }

    pub fn consecutive_failures(mut self, count: u32) -> Self {
        self.max_consecutive_failures = count;
        self
    }

    pub fn planner_timeout(mut self, ms: u64) -> Self {
        self.planner_timeout_ms = ms;
        self
    }

    pub fn planner_retry(mut self, policy: RetryPolicy) -> Self {
        self.planner_retry = policy;
        self
    }

    pub fn cache(mut self, enabled: bool) -> Self {
        self.use_cache = enabled;
        self
    }

    pub fn planner_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.planner_timeout_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }
}
