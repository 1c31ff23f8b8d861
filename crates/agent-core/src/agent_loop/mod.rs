//! Scrape, plan, execute loop.
//!
//! ```text
//! while !terminal && steps < max:
//!     page    = scrape()           // fresh immutable snapshot
//!     actions = cache or planner   // untyped JSON coerced into actions
//!     results = execute(actions)   // in order, halting on failure
//!     record step, evaluate
//! ```

pub mod config;
pub mod controller;
pub mod types;

pub use config::AgentLoopConfig;
pub use controller::AgentLoopController;
pub use types::{PlanSource, Step, StepStatus, Task, TaskFailure, TaskStatus};
