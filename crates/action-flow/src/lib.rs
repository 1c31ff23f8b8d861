//! Action execution layer
//!
//! Runs typed actions through the resolve, validate, prepare, dispatch and
//! verify phases with bounded, side-effect-aware retries.

pub mod executor;
pub mod strategies;
pub mod types;

pub use executor::{ActionExecutor, DefaultActionExecutor};
pub use strategies::{retry_allowed, RecordingSleeper, RetryPolicy, Sleeper, TokioSleeper};
pub use types::{ExecutorConfig, Phase};
