use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use super::{PlanRequest, Planner};
use crate::errors::PlannerError;

/// Replays canned responses in order.
///
/// Once the queue is drained the fallback response, if any, is returned for
/// every further call; otherwise the planner reports [`PlannerError::Exhausted`].
#[derive(Debug, Default)]
pub struct ScriptedPlanner {
    responses: Mutex<VecDeque<Result<Value, PlannerError>>>,
    fallback: Option<Value>,
    calls: AtomicU32,
}

impl ScriptedPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// One response per entry of a JSON array.
    pub fn from_json(script: Value) -> Result<Self, PlannerError> {
        match script {
            Value::Array(batches) => Ok(batches
                .into_iter()
                .fold(Self::new(), |planner, batch| planner.respond(batch))),
            other => Err(PlannerError::malformed(format!(
                "script must be an array of responses, got {}",
                kind_of(&other)
            ))),
        }
    }

    pub fn respond(self, response: Value) -> Self {
        self.responses.lock().push_back(Ok(response));
        self
    }

    pub fn fail(self, error: PlannerError) -> Self {
        self.responses.lock().push_back(Err(error));
        self
    }

    /// Response returned once the queue is empty.
    pub fn repeat(mut self, response: Value) -> Self {
        self.fallback = Some(response);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().len()
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl Planner for ScriptedPlanner {
    async fn plan(&self, request: &PlanRequest<'_>) -> Result<Value, PlannerError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(task_id = %request.task_id, step = request.step_index, call, "scripted planner");
        let next = self.responses.lock().pop_front();
        match next {
            Some(response) => response,
            None => self.fallback.clone().ok_or(PlannerError::Exhausted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perceiver_structural::ScrapedPage;
    use serde_json::json;
    use wayfinder_core_types::TaskId;

    #[tokio::test]
    async fn test_replays_then_falls_back() {
        let planner = ScriptedPlanner::new()
            .respond(json!([{"action_type": "complete"}]))
            .fail(PlannerError::Unavailable("503".into()))
            .repeat(json!([]));
        let page = ScrapedPage::builder("https://example.com/").build();
        let task_id = TaskId::from("t");
        let request = PlanRequest {
            task_id: &task_id,
            goal: "g",
            step_index: 0,
            page: &page,
            element_tree: "",
            history: &[],
        };

        assert!(planner.plan(&request).await.is_ok());
        assert!(planner.plan(&request).await.is_err());
        assert_eq!(planner.plan(&request).await.unwrap(), json!([]));
        assert_eq!(planner.calls(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_without_fallback() {
        let planner = ScriptedPlanner::from_json(json!([[]])).unwrap();
        let page = ScrapedPage::builder("https://example.com/").build();
        let task_id = TaskId::from("t");
        let request = PlanRequest {
            task_id: &task_id,
            goal: "g",
            step_index: 0,
            page: &page,
            element_tree: "",
            history: &[],
        };
        planner.plan(&request).await.unwrap();
        assert_eq!(planner.plan(&request).await, Err(PlannerError::Exhausted));
        assert!(ScriptedPlanner::from_json(json!({})).is_err());
    }
}
