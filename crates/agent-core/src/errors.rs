use perceiver_structural::ScrapeError;
use thiserror::Error;
use wayfinder_core_types::ErrorKind;

/// Failures of the planning oracle.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlannerError {
    /// The planner could not be reached or refused the request.
    #[error("planner unavailable: {0}")]
    Unavailable(String),

    /// The response could not be coerced into actions.
    #[error("malformed planner response: {0}")]
    Malformed(String),

    #[error("planner did not answer within {0}ms")]
    Timeout(u64),

    /// A scripted planner ran out of responses.
    #[error("planner has no further responses")]
    Exhausted,
}

impl PlannerError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::PlannerUnavailable
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, PlannerError::Exhausted)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}

/// Errors that end a task.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("scrape failed: {0}")]
    Scrape(#[from] ScrapeError),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error(transparent)]
    Planner(#[from] PlannerError),

    #[error("step budget of {0} exhausted")]
    BudgetExhausted(u32),

    #[error("{count} consecutive steps failed, last: {last}")]
    ConsecutiveFailures { count: u32, last: String, kind: ErrorKind },

    #[error("task cancelled")]
    Cancelled,
}

impl AgentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::Scrape(err) => err.kind(),
            AgentError::Navigation { .. } => ErrorKind::NavigationFailed,
            AgentError::Planner(err) => err.kind(),
            AgentError::BudgetExhausted(_) => ErrorKind::BudgetExhausted,
            AgentError::ConsecutiveFailures { kind, .. } => *kind,
            AgentError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planner_errors_map_to_planner_unavailable() {
        let err = AgentError::from(PlannerError::Timeout(500));
        assert_eq!(err.kind(), ErrorKind::PlannerUnavailable);
        assert!(PlannerError::malformed("not json").is_retryable());
        assert!(!PlannerError::Exhausted.is_retryable());
    }

    #[test]
    fn test_budget_exhaustion_kind() {
        assert_eq!(AgentError::BudgetExhausted(3).kind(), ErrorKind::BudgetExhausted);
    }
}
