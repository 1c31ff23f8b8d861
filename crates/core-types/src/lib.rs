//! Shared primitives for the Wayfinder execution core.
//!
//! Identifiers, the error-kind taxonomy every layer maps onto, and the
//! per-task execution context threaded from the orchestrator down to the
//! frame resolver.

use std::fmt;
use std::time::Instant;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde-full", serde(transparent))]
        #[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identifies one goal-directed Task.
    TaskId
);
string_id!(StepId);
string_id!(ActionId);
string_id!(
    /// Logical frame id assigned by the element index (`main` for the top document).
    FrameId
);
string_id!(
    /// Logical element id, stable across scrapes of an unchanged page.
    ElementId
);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl StepId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for StepId {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameId {
    pub const MAIN: &'static str = "main";

    pub fn main() -> Self {
        Self(Self::MAIN.to_string())
    }

    pub fn is_main(&self) -> bool {
        self.0 == Self::MAIN
    }
}

/// Error taxonomy shared by every layer of the execution core.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// The target id or its locator no longer matches anything.
    ElementMissing,
    /// Hidden, disabled, or otherwise unable to receive input.
    ElementNotInteractable,
    /// A hop of the frame chain could not be re-entered.
    FrameResolutionFailed,
    /// The locator matched more than one live element.
    AmbiguousElement,
    ActionTimeout,
    /// The handle went stale before any input was delivered.
    StaleElement,
    /// Another element still covers the target after overlay dismissal.
    ElementObscured,
    /// The interaction was dispatched but its post-condition did not hold.
    VerificationFailed,
    OptionNotFound,
    /// The action failed validation before reaching the browser.
    InvalidAction,
    /// The planning oracle failed, timed out, or answered with garbage.
    PlannerUnavailable,
    BudgetExhausted,
    /// The page could not be scraped at all (root frame gone).
    ScrapeFailed,
    NavigationFailed,
    Cancelled,
    Internal,
}

impl ErrorKind {
    /// Transient kinds worth another attempt under a retry policy.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::ActionTimeout
                | ErrorKind::StaleElement
                | ErrorKind::ElementObscured
                | ErrorKind::VerificationFailed
                | ErrorKind::PlannerUnavailable
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ElementMissing => "element_missing",
            ErrorKind::ElementNotInteractable => "element_not_interactable",
            ErrorKind::FrameResolutionFailed => "frame_resolution_failed",
            ErrorKind::AmbiguousElement => "ambiguous_element",
            ErrorKind::ActionTimeout => "action_timeout",
            ErrorKind::StaleElement => "stale_element",
            ErrorKind::ElementObscured => "element_obscured",
            ErrorKind::VerificationFailed => "verification_failed",
            ErrorKind::OptionNotFound => "option_not_found",
            ErrorKind::InvalidAction => "invalid_action",
            ErrorKind::PlannerUnavailable => "planner_unavailable",
            ErrorKind::BudgetExhausted => "budget_exhausted",
            ErrorKind::ScrapeFailed => "scrape_failed",
            ErrorKind::NavigationFailed => "navigation_failed",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a task context has been cancelled.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("task {task_id} cancelled")]
pub struct Cancelled {
    pub task_id: TaskId,
}

/// Per-task execution context.
///
/// Carries identity for log correlation and the cancellation token every
/// suspension point checks. Cloning shares the token.
#[derive(Clone, Debug)]
pub struct ExecCtx {
    pub task_id: TaskId,
    pub step_index: u32,
    pub action_id: Option<ActionId>,
    pub cancel_token: CancellationToken,
    started_at: Instant,
}

impl ExecCtx {
    pub fn new(task_id: TaskId, cancel_token: CancellationToken) -> Self {
        Self {
            task_id,
            step_index: 0,
            action_id: None,
            cancel_token,
            started_at: Instant::now(),
        }
    }

    /// Context for one step of the task, sharing the cancellation token.
    pub fn for_step(&self, step_index: u32) -> Self {
        Self {
            step_index,
            action_id: None,
            ..self.clone()
        }
    }

    /// Context for one action within the current step.
    pub fn for_action(&self, action_id: ActionId) -> Self {
        Self {
            action_id: Some(action_id),
            ..self.clone()
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    pub fn ensure_active(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled {
                task_id: self.task_id.clone(),
            })
        } else {
            Ok(())
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }
}
