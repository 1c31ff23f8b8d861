//! Task and step records owned by the controller.

use std::sync::Arc;

use action_primitives::{Action, ActionResult, ActionStatus, UserDefinedError};
use chrono::{DateTime, Utc};
use perceiver_structural::ScrapedPage;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use wayfinder_core_types::{ErrorKind, StepId, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Created,
    Running,
    /// A Complete action was executed.
    Completed,
    Failed,
    /// The planner gave up through a Terminate action.
    Terminated,
    /// The step budget ran out without a terminal action.
    TimedOut,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Created | TaskStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Created => "created",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Terminated => "terminated",
            TaskStatus::TimedOut => "timed_out",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a task did not complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub kind: ErrorKind,
    pub message: String,
}

/// Top-level unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub goal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_url: Option<String>,
    pub status: TaskStatus,
    pub max_steps: u32,
    pub steps_taken: u32,
    pub steps: Vec<Step>,
    /// Verification payload of the Complete action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Errors reported through a Terminate action.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<UserDefinedError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<TaskFailure>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            goal: goal.into(),
            start_url: None,
            status: TaskStatus::Created,
            max_steps: 100,
            steps_taken: 0,
            steps: Vec::new(),
            output: None,
            errors: Vec::new(),
            failure: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn with_start_url(mut self, url: impl Into<String>) -> Self {
        self.start_url = Some(url.into());
        self
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn budget_exhausted(&self) -> bool {
        self.steps_taken >= self.max_steps
    }

    pub fn last_step(&self) -> Option<&Step> {
        self.steps.last()
    }

    pub(crate) fn finish(&mut self, status: TaskStatus, failure: Option<TaskFailure>) {
        self.status = status;
        self.failure = failure;
        self.finished_at = Some(Utc::now());
    }
}

/// Where a step's batch came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum PlanSource {
    Planner {
        /// Planner calls made, including retries.
        attempts: u32,
    },
    Cache {
        key: String,
        exact: bool,
        similarity: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Every executed action succeeded; the task continues.
    Succeeded,
    /// The batch halted on a failed action.
    Failed,
    /// The batch ended the task.
    Terminal,
}

/// One iteration of the loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub index: u32,
    pub url: String,
    pub element_count: usize,
    /// The scrape the batch was planned against.
    #[serde(skip)]
    pub page: Option<Arc<ScrapedPage>>,
    pub plan_source: PlanSource,
    pub actions: Vec<Action>,
    /// One result per executed action, in batch order.
    pub results: Vec<ActionResult>,
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl Step {
    pub fn succeeded(&self) -> bool {
        self.status != StepStatus::Failed
    }

    /// Error kind of the action that halted the batch.
    pub fn failure_kind(&self) -> Option<ErrorKind> {
        self.results.iter().find_map(|result| result.error_kind)
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.results
            .iter()
            .find_map(|result| result.failure_reason.as_deref())
    }

    pub fn executed(&self) -> usize {
        self.actions
            .iter()
            .filter(|action| action.status != ActionStatus::Skipped)
            .count()
    }
}
