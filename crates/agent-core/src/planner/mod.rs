//! Planning oracle seam.
//!
//! The planner sees the goal, the current scrape and the step history and
//! answers with untyped JSON; [`crate::convert::parse_actions`] turns that into
//! a typed batch.

mod scripted;

use async_trait::async_trait;
use perceiver_structural::ScrapedPage;
use serde_json::Value;
use wayfinder_core_types::TaskId;

use crate::agent_loop::types::Step;
use crate::errors::PlannerError;

pub use scripted::ScriptedPlanner;

/// Everything the planner is told about one step.
#[derive(Debug, Clone, Copy)]
pub struct PlanRequest<'a> {
    pub task_id: &'a TaskId,
    pub goal: &'a str,
    pub step_index: u32,
    pub page: &'a ScrapedPage,
    /// Text rendering of the interactive elements.
    pub element_tree: &'a str,
    pub history: &'a [Step],
}

#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, request: &PlanRequest<'_>) -> Result<Value, PlannerError>;
}
