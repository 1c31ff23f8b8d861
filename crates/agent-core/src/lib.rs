//! Step/task orchestration for Wayfinder.
//!
//! Drives a task from its goal to a terminal status: each step scrapes the
//! page, obtains a batch of actions from the plan cache or the planner,
//! executes them in order and decides whether to continue.

pub mod agent_loop;
pub mod convert;
pub mod errors;
pub mod events;
pub mod planner;

pub use agent_loop::{
    AgentLoopConfig, AgentLoopController, PlanSource, Step, StepStatus, Task, TaskFailure,
    TaskStatus,
};
pub use convert::parse_actions;
pub use errors::{AgentError, PlannerError};
pub use events::{ChannelObserver, NoopObserver, TaskEvent, TaskObserver};
pub use planner::{PlanRequest, Planner, ScriptedPlanner};
